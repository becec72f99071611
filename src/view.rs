pub mod dialog;
pub mod notice;
pub mod overlay;

use std::collections::BTreeMap;

use dashmap::DashMap;
use tracing::debug;

use crate::entity::{EntityId, EntityKey, EntityKind, Field, FieldKey};
use crate::error::{Error, Result};
use crate::models::{Article, Assignment, Book};
use crate::progress::{ChapterSet, Deadline, ProgressState};
use overlay::OverlaySlot;

/// The boundary where view state is serialized for display.
pub trait RenderSink: Send + Sync {
    fn render(&self, key: &FieldKey, value: &ProgressState);

    fn row_changed(&self, _row: &EntityKey, _present: bool) {}
}

/// Sink for headless use: renders become debug logs.
#[derive(Debug, Default)]
pub struct TracingSink;

impl RenderSink for TracingSink {
    fn render(&self, key: &FieldKey, value: &ProgressState) {
        debug!("render {key}: {value}");
    }

    fn row_changed(&self, row: &EntityKey, present: bool) {
        debug!(present, "row {row}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPill {
    pub index: u32,
    /// `None` for pills synthesized before the backend created chapter rows.
    pub chapter_id: Option<EntityId>,
    pub completed: bool,
    pub deadline: Deadline,
}

impl ChapterPill {
    fn synthetic(index: u32) -> Self {
        Self {
            index,
            chapter_id: None,
            completed: false,
            deadline: Deadline::NONE,
        }
    }

    /// Hover text: `Deadline: Oct 18, 2026 • Completed`, `Completed`, or empty.
    pub fn title(&self) -> String {
        match (self.deadline.is_set(), self.completed) {
            (true, true) => format!("Deadline: {} • Completed", self.deadline.label()),
            (true, false) => format!("Deadline: {}", self.deadline.label()),
            (false, true) => "Completed".to_string(),
            (false, false) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRow {
    pub id: EntityId,
    pub course: EntityId,
    pub title: String,
    pub author: String,
    pub location: Option<String>,
    pub chapters: BTreeMap<u32, ChapterPill>,
}

impl BookRow {
    pub fn from_book(book: &Book) -> Self {
        let chapters = if book.chapters.is_empty() {
            (1..=book.num_chapters.unwrap_or(0))
                .map(|i| {
                    let pill = ChapterPill {
                        completed: book.completed_chapters.contains(i),
                        ..ChapterPill::synthetic(i)
                    };
                    (i, pill)
                })
                .collect()
        } else {
            book.chapters
                .iter()
                .filter(|c| c.index > 0)
                .map(|c| {
                    let pill = ChapterPill {
                        index: c.index,
                        chapter_id: Some(c.id),
                        completed: c.completed || book.completed_chapters.contains(c.index),
                        deadline: c.deadline,
                    };
                    (c.index, pill)
                })
                .collect()
        };
        Self {
            id: book.id,
            course: book.course_id,
            title: if book.title.is_empty() { "Untitled book".to_string() } else { book.title.clone() },
            author: book.author.clone(),
            location: book.location.clone(),
            chapters,
        }
    }

    pub fn meta(&self) -> String {
        let n = self.chapters.len();
        let author = if self.author.trim().is_empty() { "Unknown author" } else { &self.author };
        format!("{author} • {n} chapter{}", if n == 1 { "" } else { "s" })
    }

    pub fn completed_chapters(&self) -> ChapterSet {
        self.chapters.values().filter(|p| p.completed).map(|p| p.index).collect()
    }

    fn apply_completed(&mut self, set: &ChapterSet) {
        for pill in self.chapters.values_mut() {
            pill.completed = set.contains(pill.index);
        }
        for index in set.iter() {
            self.chapters.entry(index).or_insert_with(|| ChapterPill {
                completed: true,
                ..ChapterPill::synthetic(index)
            });
        }
    }
}

/// An article or assignment row: one completion flag, one deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub id: EntityId,
    pub kind: EntityKind,
    pub course: EntityId,
    pub title: String,
    pub meta: String,
    pub completed: bool,
    pub deadline: Deadline,
}

impl ItemRow {
    pub fn from_article(a: &Article) -> Self {
        Self {
            id: a.id,
            kind: EntityKind::Article,
            course: a.course_id,
            title: a.title.clone(),
            meta: a.author.clone(),
            completed: a.completed,
            deadline: a.deadline,
        }
    }

    pub fn from_assignment(a: &Assignment) -> Self {
        let meta = a
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or("Assignment");
        Self {
            id: a.id,
            kind: EntityKind::Assignment,
            course: a.course_id,
            title: if a.title.is_empty() { "Untitled assignment".to_string() } else { a.title.clone() },
            meta: meta.to_string(),
            completed: a.completed,
            deadline: a.deadline,
        }
    }

    pub fn key(&self) -> EntityKey {
        match self.kind {
            EntityKind::Article => EntityKey::Article(self.id),
            _ => EntityKey::Assignment(self.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Book(BookRow),
    Item(ItemRow),
}

impl Row {
    pub fn course(&self) -> EntityId {
        match self {
            Row::Book(b) => b.course,
            Row::Item(i) => i.course,
        }
    }
}

/// Owner of everything displayed: one state object per row, plus the
/// overlay slot. Every change goes through here and out to the sink.
pub struct ViewState {
    rows: DashMap<EntityKey, Row>,
    overlay: OverlaySlot,
    sink: Box<dyn RenderSink>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(TracingSink)
    }
}

impl ViewState {
    pub fn new(sink: impl RenderSink + 'static) -> Self {
        Self {
            rows: DashMap::new(),
            overlay: OverlaySlot::new(),
            sink: Box::new(sink),
        }
    }

    pub fn overlay(&self) -> &OverlaySlot {
        &self.overlay
    }

    fn insert_row(&self, key: EntityKey, row: Row) {
        self.rows.insert(key, row);
        self.sink.row_changed(&key, true);
    }

    pub fn insert_book(&self, book: &Book) {
        self.insert_row(EntityKey::Book(book.id), Row::Book(BookRow::from_book(book)));
    }

    pub fn insert_article(&self, article: &Article) {
        self.insert_row(EntityKey::Article(article.id), Row::Item(ItemRow::from_article(article)));
    }

    pub fn insert_assignment(&self, assignment: &Assignment) {
        let row = ItemRow::from_assignment(assignment);
        self.insert_row(row.key(), Row::Item(row));
    }

    pub fn remove_row(&self, key: &EntityKey) -> bool {
        let removed = self.rows.remove(&key.row()).is_some();
        if removed {
            self.sink.row_changed(&key.row(), false);
        }
        removed
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.rows.contains_key(&key.row())
    }

    pub fn book(&self, id: EntityId) -> Option<BookRow> {
        match self.rows.get(&EntityKey::Book(id)).as_deref() {
            Some(Row::Book(b)) => Some(b.clone()),
            _ => None,
        }
    }

    pub fn pill(&self, book: EntityId, index: u32) -> Option<ChapterPill> {
        self.book(book).and_then(|b| b.chapters.get(&index).cloned())
    }

    pub fn item(&self, key: &EntityKey) -> Option<ItemRow> {
        match self.rows.get(key).as_deref() {
            Some(Row::Item(i)) => Some(i.clone()),
            _ => None,
        }
    }

    /// Rows of one course, books first, then articles and assignments, by id.
    pub fn rows_for_course(&self, course: EntityId) -> Vec<(EntityKey, Row)> {
        let mut rows: Vec<_> = self
            .rows
            .iter()
            .filter(|r| r.value().course() == course)
            .map(|r| (*r.key(), r.value().clone()))
            .collect();
        rows.sort_by_key(|(k, _)| *k);
        rows
    }

    /// Currently displayed value of `key`, if it is on screen.
    pub fn read(&self, key: &FieldKey) -> Option<ProgressState> {
        let row = self.rows.get(&key.entity.row())?;
        match (key.entity, key.field, row.value()) {
            (EntityKey::Book(_), Field::CompletedChapters, Row::Book(b)) => {
                Some(ProgressState::Chapters(b.completed_chapters()))
            }
            (EntityKey::Chapter { index, .. }, field, Row::Book(b)) => {
                let pill = b.chapters.get(&index)?;
                match field {
                    Field::Completed => Some(ProgressState::Completed(pill.completed)),
                    Field::Deadline => Some(ProgressState::Deadline(pill.deadline)),
                    Field::CompletedChapters => None,
                }
            }
            (EntityKey::Article(_) | EntityKey::Assignment(_), field, Row::Item(i)) => match field {
                Field::Completed => Some(ProgressState::Completed(i.completed)),
                Field::Deadline => Some(ProgressState::Deadline(i.deadline)),
                Field::CompletedChapters => None,
            },
            _ => None,
        }
    }

    /// Replace the displayed value of `key` in one step, then notify the sink.
    pub fn render(&self, key: &FieldKey, value: &ProgressState) -> Result<()> {
        value.check_for(key)?;
        let applied = {
            let Some(mut row) = self.rows.get_mut(&key.entity.row()) else {
                return Err(Error::validation(format!("{} is not displayed", key.entity)));
            };
            match (key.entity, value, row.value_mut()) {
                (EntityKey::Book(_), ProgressState::Chapters(set), Row::Book(b)) => {
                    b.apply_completed(set);
                    true
                }
                (EntityKey::Chapter { index, .. }, value, Row::Book(b)) => match b.chapters.get_mut(&index) {
                    Some(pill) => match value {
                        ProgressState::Completed(v) => {
                            pill.completed = *v;
                            true
                        }
                        ProgressState::Deadline(d) => {
                            pill.deadline = *d;
                            true
                        }
                        ProgressState::Chapters(_) => false,
                    },
                    None => false,
                },
                (EntityKey::Article(_) | EntityKey::Assignment(_), value, Row::Item(i)) => match value {
                    ProgressState::Completed(v) => {
                        i.completed = *v;
                        true
                    }
                    ProgressState::Deadline(d) => {
                        i.deadline = *d;
                        true
                    }
                    ProgressState::Chapters(_) => false,
                },
                _ => false,
            }
        };
        if !applied {
            return Err(Error::validation(format!("{key} cannot be displayed")));
        }
        self.sink.render(key, value);
        Ok(())
    }
}
