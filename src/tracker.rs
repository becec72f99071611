use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::api::TrackerApi;
use crate::controller::ToggleController;
use crate::entity::{EntityId, EntityKey, EntityKind, FieldKey};
use crate::error::{Error, Result};
use crate::models::{Article, Assignment, Book, Course, Enrollment};
use crate::progress::{ChapterSet, Deadline, ProgressState, chapters::checked_index};
use crate::view::ViewState;
use crate::view::dialog::{self, Dialog};
use crate::view::notice::NoticeSender;
use crate::view::overlay::{ActionsMenu, Overlay, OverlayHandle, book_menu};

/// Course items shown by the view, kept in sync with a backend.
pub struct Tracker<A> {
    api: A,
    controller: ToggleController,
}

impl<A: TrackerApi> Tracker<A> {
    pub fn new(api: A, view: Arc<ViewState>, notices: NoticeSender, serialize_toggles: bool) -> Self {
        Self {
            api,
            controller: ToggleController::new(view, notices, serialize_toggles),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn view(&self) -> &Arc<ViewState> {
        self.controller.view()
    }

    pub fn controller(&self) -> &ToggleController {
        &self.controller
    }

    fn notices(&self) -> &NoticeSender {
        self.controller.notices()
    }

    /// Report a failed request, then hand the error back.
    fn fail<T>(&self, message: impl Into<String>, e: Error) -> Result<T> {
        let message = message.into();
        error!("{message}: {e}");
        self.notices().error(message);
        Err(e)
    }

    pub async fn load_books(&self, course: EntityId) -> Result<Vec<Book>> {
        match self.api.list_books(course).await {
            Ok(books) => {
                for book in &books {
                    self.view().insert_book(book);
                }
                info!(%course, "loaded {} books", books.len());
                Ok(books)
            }
            Err(e) => self.fail("Failed to load books", e),
        }
    }

    pub async fn load_articles(&self, course: EntityId) -> Result<Vec<Article>> {
        match self.api.list_articles(course).await {
            Ok(articles) => {
                for article in &articles {
                    self.view().insert_article(article);
                }
                info!(%course, "loaded {} articles", articles.len());
                Ok(articles)
            }
            Err(e) => self.fail("Failed to load articles", e),
        }
    }

    pub async fn load_assignments(&self, course: EntityId) -> Result<Vec<Assignment>> {
        match self.api.list_assignments(course).await {
            Ok(assignments) => {
                for assignment in &assignments {
                    self.view().insert_assignment(assignment);
                }
                info!(%course, "loaded {} assignments", assignments.len());
                Ok(assignments)
            }
            Err(e) => self.fail("Failed to load assignments", e),
        }
    }

    /// Load all three lists concurrently. Each list that loads is shown even
    /// if another fails.
    pub async fn load_course(&self, course: EntityId) -> Result<()> {
        let (books, articles, assignments) = futures::join!(
            self.load_books(course),
            self.load_articles(course),
            self.load_assignments(course)
        );
        books?;
        articles?;
        assignments?;
        Ok(())
    }

    /// Add or remove `index` from a book's completed chapters.
    #[instrument(skip(self))]
    pub async fn toggle_book_chapter(&self, book: EntityId, index: i64) -> Result<ChapterSet> {
        let index = checked_index(index)?;
        let key = FieldKey::chapters(book);
        let current = self.displayed(&key)?;
        let Some(before) = current.as_chapters() else {
            return Err(Error::validation(format!("{key} is not a chapter set")));
        };
        if self.view().pill(book, index).is_none() {
            return Err(Error::validation(format!("book {book} has no chapter {index}")));
        }
        let remove = before.contains(index);
        let requested = ProgressState::Chapters(before.toggled(index));

        let api = &self.api;
        let value = self
            .controller
            .toggle(key, current, requested, |_| async move {
                let after = if remove {
                    api.remove_book_progress(book, index).await?
                } else {
                    api.add_book_progress(book, index).await?
                };
                Ok(ProgressState::Chapters(after))
            })
            .await?;
        Ok(value.as_chapters().cloned().unwrap_or_default())
    }

    /// Flip the completion of one chapter pill. Pills without a persisted
    /// chapter only change locally.
    #[instrument(skip(self))]
    pub async fn toggle_chapter(&self, book: EntityId, index: u32) -> Result<bool> {
        let entity = EntityKey::Chapter { book, index };
        let pill = self
            .view()
            .pill(book, index)
            .ok_or_else(|| Error::validation(format!("{entity} is not displayed")))?;
        let key = FieldKey::completed(entity);
        let requested = !pill.completed;
        let result = match pill.chapter_id {
            Some(chapter) => {
                self.toggle_completed(key, EntityKind::Chapter, chapter, pill.completed)
                    .await
            }
            None => self
                .controller
                .toggle_local(key, ProgressState::Completed(requested))
                .map(|_| requested),
        };
        self.close_actions(entity);
        result
    }

    pub async fn toggle_article(&self, id: EntityId) -> Result<bool> {
        self.toggle_item(EntityKey::Article(id)).await
    }

    pub async fn toggle_assignment(&self, id: EntityId) -> Result<bool> {
        self.toggle_item(EntityKey::Assignment(id)).await
    }

    #[instrument(skip(self))]
    async fn toggle_item(&self, entity: EntityKey) -> Result<bool> {
        let key = FieldKey::completed(entity);
        let current = self.displayed(&key)?;
        let completed = current.as_completed().unwrap_or_default();
        let id = match entity {
            EntityKey::Article(id) | EntityKey::Assignment(id) => id,
            _ => return Err(Error::validation(format!("{entity} has no completion flag"))),
        };
        let result = self.toggle_completed(key, entity.kind(), id, completed).await;
        self.close_actions(entity);
        result
    }

    async fn toggle_completed(&self, key: FieldKey, kind: EntityKind, id: EntityId, completed: bool) -> Result<bool> {
        let api = &self.api;
        let value = self
            .controller
            .toggle(
                key,
                ProgressState::Completed(completed),
                ProgressState::Completed(!completed),
                |requested| async move {
                    let wanted = requested.as_completed().unwrap_or(!completed);
                    Ok(ProgressState::Completed(api.set_progress(kind, id, wanted).await?))
                },
            )
            .await?;
        Ok(value.as_completed().unwrap_or(!completed))
    }

    /// Set or clear the deadline of a chapter, article or assignment.
    #[instrument(skip(self))]
    pub async fn set_deadline(&self, entity: EntityKey, deadline: Deadline) -> Result<Deadline> {
        let key = FieldKey::deadline(entity);
        let (kind, id) = match entity {
            EntityKey::Book(_) => return Err(Error::validation("books have no deadline")),
            EntityKey::Chapter { book, index } => {
                let pill = self
                    .view()
                    .pill(book, index)
                    .ok_or_else(|| Error::validation(format!("{entity} is not displayed")))?;
                match pill.chapter_id {
                    Some(chapter) => (EntityKind::Chapter, chapter),
                    None => {
                        self.controller.toggle_local(key, ProgressState::Deadline(deadline))?;
                        return Ok(deadline);
                    }
                }
            }
            EntityKey::Article(id) => (EntityKind::Article, id),
            EntityKey::Assignment(id) => (EntityKind::Assignment, id),
        };
        let current = self.displayed(&key)?;
        let api = &self.api;
        let value = self
            .controller
            .toggle(key, current, ProgressState::Deadline(deadline), |requested| async move {
                let wanted = requested.as_deadline().unwrap_or(deadline);
                Ok(ProgressState::Deadline(api.set_deadline(kind, id, wanted).await?))
            })
            .await?;
        Ok(value.as_deadline().unwrap_or(deadline))
    }

    pub async fn clear_deadline(&self, entity: EntityKey) -> Result<Deadline> {
        self.set_deadline(entity, Deadline::NONE).await
    }

    pub async fn delete_book(&self, id: EntityId) -> Result<()> {
        self.delete(EntityKey::Book(id)).await
    }

    pub async fn delete_article(&self, id: EntityId) -> Result<()> {
        self.delete(EntityKey::Article(id)).await
    }

    pub async fn delete_assignment(&self, id: EntityId) -> Result<()> {
        self.delete(EntityKey::Assignment(id)).await
    }

    /// Not optimistic: the row goes away only once the backend agrees.
    #[instrument(skip(self))]
    async fn delete(&self, entity: EntityKey) -> Result<()> {
        let kind = entity.kind();
        let id = match entity {
            EntityKey::Book(id) | EntityKey::Article(id) | EntityKey::Assignment(id) => id,
            EntityKey::Chapter { .. } => {
                return Err(Error::validation("chapters are deleted with their book"));
            }
        };
        match self.api.delete(kind, id).await {
            Ok(()) => {
                self.view().remove_row(&entity);
                self.view().overlay().dismiss();
                info!(%entity, "deleted");
                self.notices().success(format!("{} deleted", capitalize(kind.label())));
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                let message = match kind {
                    EntityKind::Book => "Cannot delete: at least one person has completed a chapter in this book",
                    _ => "Cannot delete: at least one person has completed it",
                };
                self.fail(message, e)
            }
            Err(e) => self.fail(format!("Failed to delete {kind}"), e),
        }
    }

    pub async fn create_book(&self, course: EntityId, inputs: &HashMap<String, String>) -> Result<Book> {
        let form = Dialog::create_book().parse(inputs)?;
        let new = dialog::new_book(course, &form)?;
        match self.api.create_book(&new).await {
            Ok(book) => {
                self.view().insert_book(&book);
                self.notices().success(format!("Added \"{}\"", book.title));
                Ok(book)
            }
            Err(e) => self.fail("Failed to create book", e),
        }
    }

    pub async fn create_article(&self, course: EntityId, inputs: &HashMap<String, String>) -> Result<Article> {
        let form = Dialog::create_article().parse(inputs)?;
        let new = dialog::new_article(course, &form)?;
        match self.api.create_article(&new).await {
            Ok(article) => {
                self.view().insert_article(&article);
                self.notices().success(format!("Added \"{}\"", article.title));
                Ok(article)
            }
            Err(e) => self.fail("Failed to create article", e),
        }
    }

    pub async fn create_assignment(&self, course: EntityId, inputs: &HashMap<String, String>) -> Result<Assignment> {
        let form = Dialog::create_assignment().parse(inputs)?;
        let new = dialog::new_assignment(course, &form)?;
        match self.api.create_assignment(&new).await {
            Ok(assignment) => {
                self.view().insert_assignment(&assignment);
                self.notices().success(format!("Added \"{}\"", assignment.title));
                Ok(assignment)
            }
            Err(e) => self.fail("Failed to create assignment", e),
        }
    }

    pub async fn create_course(
        &self,
        university: &str,
        current_year: i32,
        inputs: &HashMap<String, String>,
    ) -> Result<Course> {
        let form = Dialog::create_course(current_year).parse(inputs)?;
        let new = dialog::new_course(university, &form)?;
        match self.api.create_course(&new).await {
            Ok(course) => {
                self.notices()
                    .success(format!("Added \"{}: {}\"", course.code, course.name));
                Ok(course)
            }
            Err(e) => self.fail("Failed to create course", e),
        }
    }

    pub async fn enroll(&self, course: &Course) -> Result<Enrollment> {
        match self.api.enroll(course.id).await {
            Ok(enrollment) => {
                self.notices()
                    .success(format!("Enrolled in {}: {}", course.code, course.name));
                Ok(enrollment)
            }
            Err(e) => self.fail("Failed to enroll", e),
        }
    }

    pub async fn leave_course(&self, course: &Course) -> Result<()> {
        match self.api.unenroll(course.id).await {
            Ok(()) => {
                for (key, _) in self.view().rows_for_course(course.id) {
                    self.view().remove_row(&key);
                }
                self.notices().info(format!("Left {}", course.code));
                Ok(())
            }
            Err(e) => self.fail("Failed to leave course", e),
        }
    }

    /// Open the complete/deadline menu of one chapter pill.
    pub fn open_chapter_actions(&self, book: EntityId, index: u32) -> Result<OverlayHandle> {
        let target = EntityKey::Chapter { book, index };
        let pill = self
            .view()
            .pill(book, index)
            .ok_or_else(|| Error::validation(format!("{target} is not displayed")))?;
        let menu = ActionsMenu::new(target, pill.completed, pill.deadline);
        Ok(self.view().overlay().open(Overlay::Actions(menu)).0)
    }

    /// Open the complete/deadline menu of an article or assignment.
    pub fn open_item_actions(&self, entity: EntityKey) -> Result<OverlayHandle> {
        let item = self
            .view()
            .item(&entity)
            .ok_or_else(|| Error::validation(format!("{entity} is not displayed")))?;
        let menu = ActionsMenu::new(entity, item.completed, item.deadline);
        Ok(self.view().overlay().open(Overlay::Actions(menu)).0)
    }

    pub fn open_book_menu(&self, book: EntityId) -> Result<OverlayHandle> {
        if self.view().book(book).is_none() {
            return Err(Error::validation(format!("book {book} is not displayed")));
        }
        Ok(self.view().overlay().open(book_menu(book)).0)
    }

    /// Open the row menu of a displayed article or assignment.
    pub fn open_item_menu(&self, entity: EntityKey) -> Result<OverlayHandle> {
        if self.view().item(&entity).is_none() {
            return Err(Error::validation(format!("{entity} is not displayed")));
        }
        Ok(self.view().overlay().open(Overlay::RowMenu { row: entity }).0)
    }

    pub fn open_date_picker(&self, target: EntityKey) -> Result<OverlayHandle> {
        let key = FieldKey::deadline(target);
        let initial = self.displayed(&key)?.as_deadline().unwrap_or_default();
        Ok(self.view().overlay().open(Overlay::DatePicker { target, initial }).0)
    }

    pub fn open_dialog(&self, dialog: Dialog) -> Result<OverlayHandle> {
        dialog.validate()?;
        Ok(self.view().overlay().open(Overlay::Dialog(dialog)).0)
    }

    fn displayed(&self, key: &FieldKey) -> Result<ProgressState> {
        self.view()
            .read(key)
            .ok_or_else(|| Error::validation(format!("{} is not displayed", key.entity)))
    }

    /// Toggling from the actions menu closes it, whatever the outcome.
    fn close_actions(&self, entity: EntityKey) {
        let overlay = self.view().overlay();
        if let Some(Overlay::Actions(menu)) = overlay.current() {
            if menu.target == entity {
                overlay.dismiss();
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
