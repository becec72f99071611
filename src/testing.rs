//! In-memory backend and render recorder shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};

use crate::api::{CatalogApi, ProgressApi};
use crate::entity::{EntityId, EntityKey, EntityKind, FieldKey};
use crate::error::{Error, Result};
use crate::models::{
    Article, Assignment, Book, CalendarToken, ChapterStatus, Course, Enrollment, Membership,
    NewArticle, NewAssignment, NewBook, NewCourse, University,
};
use crate::progress::{ChapterSet, Deadline, ProgressState};
use crate::view::RenderSink;

/// Records every render and row change, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    renders: Arc<Mutex<Vec<(FieldKey, ProgressState)>>>,
    rows: Arc<Mutex<Vec<(EntityKey, bool)>>>,
}

impl RecordingSink {
    pub fn renders(&self) -> Vec<(FieldKey, ProgressState)> {
        self.renders.lock().clone()
    }

    pub fn values(&self, key: &FieldKey) -> Vec<ProgressState> {
        self.renders
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn row_events(&self) -> Vec<(EntityKey, bool)> {
        self.rows.lock().clone()
    }

    pub fn clear(&self) {
        self.renders.lock().clear();
        self.rows.lock().clear();
    }
}

impl RenderSink for RecordingSink {
    fn render(&self, key: &FieldKey, value: &ProgressState) {
        self.renders.lock().push((*key, value.clone()));
    }

    fn row_changed(&self, row: &EntityKey, present: bool) {
        self.rows.lock().push((*row, present));
    }
}

#[derive(Debug, Default)]
struct Backend {
    next_id: i64,
    books: BTreeMap<EntityId, Book>,
    book_progress: BTreeMap<EntityId, ChapterSet>,
    articles: BTreeMap<EntityId, Article>,
    assignments: BTreeMap<EntityId, Assignment>,
    courses: BTreeMap<EntityId, Course>,
    enrolled: BTreeSet<EntityId>,
    universities: Vec<University>,
    memberships: Vec<Membership>,
    calendar: Option<CalendarToken>,
    failures: VecDeque<Error>,
    calls: Vec<String>,
}

impl Backend {
    fn next_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId::new(self.next_id).expect("ids count up from 1")
    }

    fn chapter_mut(&mut self, id: EntityId) -> Result<&mut ChapterStatus> {
        self.books
            .values_mut()
            .flat_map(|b| b.chapters.iter_mut())
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("chapter {id}")))
    }
}

/// A backend that keeps everything in memory and can be told to fail.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<Backend>,
}

const USER: &str = "user-1";

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next call, whatever it is.
    pub fn fail_next(&self, error: Error) {
        self.state.lock().failures.push_back(error);
    }

    /// Names of the calls made so far, e.g. `add_book_progress(1, 3)`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    fn enter(&self, call: String) -> Result<MutexGuard<'_, Backend>> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.failures.pop_front() {
            Some(e) => Err(e),
            None => Ok(state),
        }
    }

    pub fn add_course(&self, code: &str, name: &str) -> Course {
        let mut state = self.state.lock();
        let course = Course {
            id: state.next_id(),
            university_id: "ntnu".into(),
            year: 2026,
            term: 1,
            code: code.into(),
            name: name.into(),
        };
        state.courses.insert(course.id, course.clone());
        course
    }

    /// A book whose chapters are not persisted yet.
    pub fn add_book(&self, course: EntityId, title: &str, num_chapters: u32) -> Book {
        let mut state = self.state.lock();
        let book = Book {
            id: state.next_id(),
            course_id: course,
            title: title.into(),
            author: "Author".into(),
            num_chapters: Some(num_chapters),
            location: None,
            chapters: vec![],
            completed_chapters: ChapterSet::new(),
        };
        state.books.insert(book.id, book.clone());
        book
    }

    /// A book with persisted chapter rows `1..=num_chapters`.
    pub fn add_book_with_chapters(&self, course: EntityId, title: &str, num_chapters: u32) -> Book {
        let book = self.add_book(course, title, num_chapters);
        let mut state = self.state.lock();
        let chapters: Vec<ChapterStatus> = (1..=num_chapters)
            .map(|index| ChapterStatus {
                id: state.next_id(),
                index,
                completed: false,
                deadline: Deadline::NONE,
            })
            .collect();
        let stored = state.books.get_mut(&book.id).expect("book was just inserted");
        stored.chapters = chapters;
        stored.clone()
    }

    pub fn add_article(&self, course: EntityId, title: &str) -> Article {
        let mut state = self.state.lock();
        let article = Article {
            id: state.next_id(),
            course_id: course,
            title: title.into(),
            author: "Author".into(),
            location: None,
            deadline: Deadline::NONE,
            completed: false,
        };
        state.articles.insert(article.id, article.clone());
        article
    }

    pub fn add_assignment(&self, course: EntityId, title: &str) -> Assignment {
        let mut state = self.state.lock();
        let assignment = Assignment {
            id: state.next_id(),
            course_id: course,
            title: title.into(),
            description: None,
            deadline: Deadline::NONE,
            completed: false,
        };
        state.assignments.insert(assignment.id, assignment.clone());
        assignment
    }

    /// Progress recorded behind the client's back, e.g. from another device.
    pub fn set_book_progress(&self, book: EntityId, chapters: ChapterSet) {
        self.state.lock().book_progress.insert(book, chapters);
    }

    pub fn book_progress(&self, book: EntityId) -> ChapterSet {
        self.state.lock().book_progress.get(&book).cloned().unwrap_or_default()
    }

    pub fn set_item(&self, kind: EntityKind, id: EntityId, completed: bool, deadline: Deadline) {
        let mut state = self.state.lock();
        match kind {
            EntityKind::Article => {
                if let Some(a) = state.articles.get_mut(&id) {
                    a.completed = completed;
                    a.deadline = deadline;
                }
            }
            EntityKind::Assignment => {
                if let Some(a) = state.assignments.get_mut(&id) {
                    a.completed = completed;
                    a.deadline = deadline;
                }
            }
            EntityKind::Chapter => {
                if let Ok(c) = state.chapter_mut(id) {
                    c.completed = completed;
                    c.deadline = deadline;
                }
            }
            EntityKind::Book => {}
        }
    }

    pub fn item_completed(&self, kind: EntityKind, id: EntityId) -> Option<bool> {
        let mut state = self.state.lock();
        match kind {
            EntityKind::Article => state.articles.get(&id).map(|a| a.completed),
            EntityKind::Assignment => state.assignments.get(&id).map(|a| a.completed),
            EntityKind::Chapter => state.chapter_mut(id).ok().map(|c| c.completed),
            EntityKind::Book => None,
        }
    }

    pub fn contains(&self, kind: EntityKind, id: EntityId) -> bool {
        let state = self.state.lock();
        match kind {
            EntityKind::Book => state.books.contains_key(&id),
            EntityKind::Article => state.articles.contains_key(&id),
            EntityKind::Assignment => state.assignments.contains_key(&id),
            EntityKind::Chapter => false,
        }
    }
}

#[async_trait]
impl ProgressApi for FakeApi {
    async fn set_progress(&self, kind: EntityKind, id: EntityId, completed: bool) -> Result<bool> {
        let mut state = self.enter(format!("set_progress({kind}, {id}, {completed})"))?;
        let slot = match kind {
            EntityKind::Chapter => &mut state.chapter_mut(id)?.completed,
            EntityKind::Article => match state.articles.get_mut(&id) {
                Some(a) => &mut a.completed,
                None => return Err(Error::NotFound(format!("article {id}"))),
            },
            EntityKind::Assignment => match state.assignments.get_mut(&id) {
                Some(a) => &mut a.completed,
                None => return Err(Error::NotFound(format!("assignment {id}"))),
            },
            EntityKind::Book => return Err(Error::validation("books track chapters")),
        };
        *slot = completed;
        Ok(completed)
    }

    async fn set_deadline(&self, kind: EntityKind, id: EntityId, deadline: Deadline) -> Result<Deadline> {
        let mut state = self.enter(format!("set_deadline({kind}, {id}, {deadline})"))?;
        let slot = match kind {
            EntityKind::Chapter => &mut state.chapter_mut(id)?.deadline,
            EntityKind::Article => match state.articles.get_mut(&id) {
                Some(a) => &mut a.deadline,
                None => return Err(Error::NotFound(format!("article {id}"))),
            },
            EntityKind::Assignment => match state.assignments.get_mut(&id) {
                Some(a) => &mut a.deadline,
                None => return Err(Error::NotFound(format!("assignment {id}"))),
            },
            EntityKind::Book => return Err(Error::validation("books have no deadline")),
        };
        *slot = deadline;
        Ok(deadline)
    }

    async fn add_book_progress(&self, book: EntityId, chapter: u32) -> Result<ChapterSet> {
        let mut state = self.enter(format!("add_book_progress({book}, {chapter})"))?;
        if !state.books.contains_key(&book) {
            return Err(Error::NotFound(format!("book {book}")));
        }
        let set = state.book_progress.entry(book).or_default();
        *set = set.iter().chain([chapter]).collect();
        Ok(set.clone())
    }

    async fn remove_book_progress(&self, book: EntityId, chapter: u32) -> Result<ChapterSet> {
        let mut state = self.enter(format!("remove_book_progress({book}, {chapter})"))?;
        if !state.books.contains_key(&book) {
            return Err(Error::NotFound(format!("book {book}")));
        }
        let set = state.book_progress.entry(book).or_default();
        *set = set.iter().filter(|&i| i != chapter).collect();
        Ok(set.clone())
    }

    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<()> {
        let mut state = self.enter(format!("delete({kind}, {id})"))?;
        match kind {
            EntityKind::Book => {
                let book = state
                    .books
                    .get(&id)
                    .ok_or_else(|| Error::NotFound(format!("book {id}")))?;
                let started = book.chapters.iter().any(|c| c.completed)
                    || state.book_progress.get(&id).is_some_and(|s| !s.is_empty());
                if started {
                    return Err(Error::Conflict("book has chapter progress".into()));
                }
                state.books.remove(&id);
                state.book_progress.remove(&id);
            }
            EntityKind::Article => {
                match state.articles.get(&id) {
                    None => return Err(Error::NotFound(format!("article {id}"))),
                    Some(a) if a.completed => return Err(Error::Conflict("article has progress".into())),
                    Some(_) => {}
                }
                state.articles.remove(&id);
            }
            EntityKind::Assignment => {
                match state.assignments.get(&id) {
                    None => return Err(Error::NotFound(format!("assignment {id}"))),
                    Some(a) if a.completed => return Err(Error::Conflict("assignment has progress".into())),
                    Some(_) => {}
                }
                state.assignments.remove(&id);
            }
            EntityKind::Chapter => return Err(Error::validation("chapters are deleted with their book")),
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogApi for FakeApi {
    async fn list_books(&self, course: EntityId) -> Result<Vec<Book>> {
        let state = self.enter(format!("list_books({course})"))?;
        let books = state
            .books
            .values()
            .filter(|b| b.course_id == course)
            .map(|b| Book {
                completed_chapters: state.book_progress.get(&b.id).cloned().unwrap_or_default(),
                ..b.clone()
            })
            .collect();
        Ok(books)
    }

    async fn list_articles(&self, course: EntityId) -> Result<Vec<Article>> {
        let state = self.enter(format!("list_articles({course})"))?;
        Ok(state.articles.values().filter(|a| a.course_id == course).cloned().collect())
    }

    async fn list_assignments(&self, course: EntityId) -> Result<Vec<Assignment>> {
        let state = self.enter(format!("list_assignments({course})"))?;
        Ok(state.assignments.values().filter(|a| a.course_id == course).cloned().collect())
    }

    async fn create_book(&self, book: &NewBook) -> Result<Book> {
        let mut state = self.enter(format!("create_book({})", book.title))?;
        let created = Book {
            id: state.next_id(),
            course_id: book.course_id,
            title: book.title.clone(),
            author: book.author.clone(),
            num_chapters: Some(book.num_chapters),
            location: book.location.clone(),
            chapters: vec![],
            completed_chapters: ChapterSet::new(),
        };
        state.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn create_article(&self, article: &NewArticle) -> Result<Article> {
        let mut state = self.enter(format!("create_article({})", article.title))?;
        let created = Article {
            id: state.next_id(),
            course_id: article.course_id,
            title: article.title.clone(),
            author: article.author.clone(),
            location: article.location.clone(),
            deadline: Deadline::NONE,
            completed: false,
        };
        state.articles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn create_assignment(&self, assignment: &NewAssignment) -> Result<Assignment> {
        let mut state = self.enter(format!("create_assignment({})", assignment.title))?;
        let created = Assignment {
            id: state.next_id(),
            course_id: assignment.course_id,
            title: assignment.title.clone(),
            description: assignment.description.clone(),
            deadline: Deadline::NONE,
            completed: false,
        };
        state.assignments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn my_courses(&self, university: &str) -> Result<Vec<Course>> {
        let state = self.enter(format!("my_courses({university})"))?;
        Ok(state
            .courses
            .values()
            .filter(|c| c.university_id == university && state.enrolled.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn course_catalog(&self, university: &str) -> Result<Vec<Course>> {
        let state = self.enter(format!("course_catalog({university})"))?;
        Ok(state.courses.values().filter(|c| c.university_id == university).cloned().collect())
    }

    async fn create_course(&self, course: &NewCourse) -> Result<Course> {
        let mut state = self.enter(format!("create_course({})", course.code))?;
        let created = Course {
            id: state.next_id(),
            university_id: course.university_id.clone(),
            year: course.year,
            term: course.term,
            code: course.code.clone(),
            name: course.name.clone(),
        };
        state.courses.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_course(&self, course: EntityId) -> Result<()> {
        let mut state = self.enter(format!("delete_course({course})"))?;
        let in_use = state.books.values().any(|b| b.course_id == course)
            || state.articles.values().any(|a| a.course_id == course)
            || state.assignments.values().any(|a| a.course_id == course);
        if in_use {
            return Err(Error::Conflict("course has items".into()));
        }
        state
            .courses
            .remove(&course)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("course {course}")))
    }

    async fn enroll(&self, course: EntityId) -> Result<Enrollment> {
        let mut state = self.enter(format!("enroll({course})"))?;
        if !state.courses.contains_key(&course) {
            return Err(Error::NotFound(format!("course {course}")));
        }
        state.enrolled.insert(course);
        Ok(Enrollment {
            user_id: USER.into(),
            course_id: course,
        })
    }

    async fn unenroll(&self, course: EntityId) -> Result<()> {
        let mut state = self.enter(format!("unenroll({course})"))?;
        if state.enrolled.remove(&course) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("enrollment in course {course}")))
        }
    }

    async fn universities(&self) -> Result<Vec<University>> {
        let state = self.enter("universities".into())?;
        Ok(state.universities.clone())
    }

    async fn my_universities(&self) -> Result<Vec<Membership>> {
        let state = self.enter("my_universities".into())?;
        Ok(state.memberships.clone())
    }

    async fn join_university(&self, university: &str) -> Result<Membership> {
        let mut state = self.enter(format!("join_university({university})"))?;
        let membership = Membership {
            user_id: USER.into(),
            university_id: university.into(),
        };
        if !state.memberships.contains(&membership) {
            state.memberships.push(membership.clone());
        }
        Ok(membership)
    }

    async fn calendar_token(&self) -> Result<Option<CalendarToken>> {
        let state = self.enter("calendar_token".into())?;
        Ok(state.calendar.clone())
    }

    async fn rotate_calendar_token(&self) -> Result<CalendarToken> {
        let mut state = self.enter("rotate_calendar_token".into())?;
        let n = state.next_id();
        let token = CalendarToken {
            token: format!("tok{n}"),
            url_path: format!("/api/calendar/tok{n}.ics"),
        };
        state.calendar = Some(token.clone());
        Ok(token)
    }
}
