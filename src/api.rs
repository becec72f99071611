pub mod http;

use async_trait::async_trait;

use crate::entity::{EntityId, EntityKind};
use crate::error::Result;
use crate::models::{
    Article, Assignment, Book, CalendarToken, Course, Enrollment, Membership, NewArticle,
    NewAssignment, NewBook, NewCourse, University,
};
use crate::progress::{ChapterSet, Deadline};

/// Progress mutations, one capability family per entity kind.
///
/// Every call returns the backend's authoritative value after the change.
#[async_trait]
pub trait ProgressApi: Send + Sync {
    /// Chapters, articles and assignments.
    async fn set_progress(&self, kind: EntityKind, id: EntityId, completed: bool) -> Result<bool>;

    /// Chapters, articles and assignments. `Deadline::NONE` clears.
    async fn set_deadline(&self, kind: EntityKind, id: EntityId, deadline: Deadline) -> Result<Deadline>;

    async fn add_book_progress(&self, book: EntityId, chapter: u32) -> Result<ChapterSet>;

    async fn remove_book_progress(&self, book: EntityId, chapter: u32) -> Result<ChapterSet>;

    /// Fails with `Conflict` when someone has recorded progress on the entity.
    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<()>;
}

/// Everything the tracker reads or creates besides progress.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn list_books(&self, course: EntityId) -> Result<Vec<Book>>;
    async fn list_articles(&self, course: EntityId) -> Result<Vec<Article>>;
    async fn list_assignments(&self, course: EntityId) -> Result<Vec<Assignment>>;

    async fn create_book(&self, book: &NewBook) -> Result<Book>;
    async fn create_article(&self, article: &NewArticle) -> Result<Article>;
    async fn create_assignment(&self, assignment: &NewAssignment) -> Result<Assignment>;

    /// Courses the caller is enrolled in.
    async fn my_courses(&self, university: &str) -> Result<Vec<Course>>;
    /// Every course of the university.
    async fn course_catalog(&self, university: &str) -> Result<Vec<Course>>;
    async fn create_course(&self, course: &NewCourse) -> Result<Course>;
    /// Fails with `Conflict` while the course still has items.
    async fn delete_course(&self, course: EntityId) -> Result<()>;
    async fn enroll(&self, course: EntityId) -> Result<Enrollment>;
    async fn unenroll(&self, course: EntityId) -> Result<()>;

    async fn universities(&self) -> Result<Vec<University>>;
    async fn my_universities(&self) -> Result<Vec<Membership>>;
    async fn join_university(&self, university: &str) -> Result<Membership>;

    /// `None` when not signed in.
    async fn calendar_token(&self) -> Result<Option<CalendarToken>>;
    async fn rotate_calendar_token(&self) -> Result<CalendarToken>;
}

/// A full backend: both halves.
pub trait TrackerApi: ProgressApi + CatalogApi {}

impl<T: ProgressApi + CatalogApi> TrackerApi for T {}
