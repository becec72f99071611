use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Backend identifier of a persisted entity. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct EntityId(i64);

impl EntityId {
    pub fn new(id: i64) -> Result<Self> {
        if id <= 0 {
            return Err(Error::validation(format!("id must be positive, got {id}")));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for EntityId {
    type Error = Error;
    fn try_from(value: i64) -> Result<Self> {
        EntityId::new(value)
    }
}

impl From<EntityId> for i64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Book,
    Chapter,
    Article,
    Assignment,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Book => "book",
            EntityKind::Chapter => "chapter",
            EntityKind::Article => "article",
            EntityKind::Assignment => "assignment",
        }
    }

    /// Collection segment of the REST path, e.g. `/articles/{id}/progress`.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Book => "books",
            EntityKind::Chapter => "chapters",
            EntityKind::Article => "articles",
            EntityKind::Assignment => "assignments",
        }
    }

    /// JSON key carrying the id in delete bodies.
    pub fn id_key(self) -> &'static str {
        match self {
            EntityKind::Book => "bookId",
            EntityKind::Chapter => "chapterId",
            EntityKind::Article => "articleId",
            EntityKind::Assignment => "assignmentId",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of something displayed in the view.
///
/// Chapters are addressed by their book and 1-based index, so pills that
/// have no persisted chapter id yet still have a stable key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKey {
    Book(EntityId),
    Chapter { book: EntityId, index: u32 },
    Article(EntityId),
    Assignment(EntityId),
}

impl EntityKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityKey::Book(_) => EntityKind::Book,
            EntityKey::Chapter { .. } => EntityKind::Chapter,
            EntityKey::Article(_) => EntityKind::Article,
            EntityKey::Assignment(_) => EntityKind::Assignment,
        }
    }

    /// Key of the top-level row that owns this entity.
    pub fn row(&self) -> EntityKey {
        match *self {
            EntityKey::Chapter { book, .. } => EntityKey::Book(book),
            other => other,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Book(id) => write!(f, "book {id}"),
            EntityKey::Chapter { book, index } => write!(f, "book {book} chapter {index}"),
            EntityKey::Article(id) => write!(f, "article {id}"),
            EntityKey::Assignment(id) => write!(f, "assignment {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// Boolean completion of a chapter, article or assignment.
    Completed,
    /// Set of completed chapter indices of a book.
    CompletedChapters,
    Deadline,
}

/// One mutable progress property of one displayed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldKey {
    pub entity: EntityKey,
    pub field: Field,
}

impl FieldKey {
    pub fn new(entity: EntityKey, field: Field) -> Self {
        Self { entity, field }
    }

    pub fn completed(entity: EntityKey) -> Self {
        Self::new(entity, Field::Completed)
    }

    pub fn chapters(book: EntityId) -> Self {
        Self::new(EntityKey::Book(book), Field::CompletedChapters)
    }

    pub fn deadline(entity: EntityKey) -> Self {
        Self::new(entity, Field::Deadline)
    }

    /// Message announced when a toggle of this field rolls back.
    pub fn failure_message(&self) -> String {
        match self.field {
            Field::Deadline => "Failed to set deadline".to_string(),
            Field::CompletedChapters => "Failed to update chapter".to_string(),
            Field::Completed => format!("Failed to update {}", self.entity.kind()),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match self.field {
            Field::Completed => "completed",
            Field::CompletedChapters => "completed chapters",
            Field::Deadline => "deadline",
        };
        write!(f, "{} {field}", self.entity)
    }
}
