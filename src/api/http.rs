use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, instrument};

use super::{CatalogApi, ProgressApi};
use crate::config::Config;
use crate::entity::{EntityId, EntityKind};
use crate::error::{Error, Result};
use crate::models::{
    Article, Assignment, Book, BookProgressBody, CalendarToken, ChapterAction, CompletedBody,
    Course, DeadlineBody, DeadlineReply, Enrollment, Membership, NewArticle, NewAssignment,
    NewBook, NewCourse, University,
};
use crate::progress::{ChapterSet, Deadline};

/// JSON-over-HTTP client of the tracker backend.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base: String,
}

impl HttpApi {
    pub fn new(base: impl Into<String>, timeout: Duration, session: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(session) = session {
            let value = HeaderValue::from_str(&format!("session={session}"))
                .map_err(|e| Error::validation(format!("invalid session cookie: {e}")))?;
            headers.insert(COOKIE, value);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_base.clone(),
            Duration::from_secs(config.request_timeout_secs),
            config.session.as_deref(),
        )
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base, path.trim_start_matches('/')))
    }

    async fn check(req: RequestBuilder) -> Result<reqwest::Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let err = Error::from_status(status.as_u16(), body);
        error!(status = status.as_u16(), "request failed: {err}");
        Err(err)
    }

    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
        let resp = Self::check(req).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_empty(req: RequestBuilder) -> Result<()> {
        Self::check(req).await?;
        Ok(())
    }

    async fn patch_book_progress(&self, book: EntityId, chapter: u32, action: ChapterAction) -> Result<ChapterSet> {
        let req = self
            .request(Method::PATCH, &format!("books/{book}/progress"))
            .json(&BookProgressBody { chapter, action });
        Self::send(req).await
    }
}

fn toggleable(kind: EntityKind) -> Result<()> {
    if kind == EntityKind::Book {
        return Err(Error::validation(
            "books track progress per chapter, not as a single flag or deadline",
        ));
    }
    Ok(())
}

#[async_trait]
impl ProgressApi for HttpApi {
    #[instrument(skip(self))]
    async fn set_progress(&self, kind: EntityKind, id: EntityId, completed: bool) -> Result<bool> {
        toggleable(kind)?;
        let req = self
            .request(Method::PATCH, &format!("{}/{id}/progress", kind.collection()))
            .json(&CompletedBody { completed });
        let reply: CompletedBody = Self::send(req).await?;
        Ok(reply.completed)
    }

    #[instrument(skip(self))]
    async fn set_deadline(&self, kind: EntityKind, id: EntityId, deadline: Deadline) -> Result<Deadline> {
        toggleable(kind)?;
        let req = self
            .request(Method::PATCH, &format!("{}/{id}/deadline", kind.collection()))
            .json(&DeadlineBody { deadline });
        let reply: DeadlineReply = Self::send(req).await?;
        Ok(reply.deadline)
    }

    #[instrument(skip(self))]
    async fn add_book_progress(&self, book: EntityId, chapter: u32) -> Result<ChapterSet> {
        self.patch_book_progress(book, chapter, ChapterAction::Add).await
    }

    #[instrument(skip(self))]
    async fn remove_book_progress(&self, book: EntityId, chapter: u32) -> Result<ChapterSet> {
        self.patch_book_progress(book, chapter, ChapterAction::Remove).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<()> {
        if kind == EntityKind::Chapter {
            return Err(Error::validation("chapters are deleted with their book"));
        }
        let req = self
            .request(Method::DELETE, kind.collection())
            .json(&json!({ kind.id_key(): id }));
        Self::send_empty(req).await
    }
}

#[async_trait]
impl CatalogApi for HttpApi {
    #[instrument(skip(self))]
    async fn list_books(&self, course: EntityId) -> Result<Vec<Book>> {
        Self::send(self.request(Method::GET, "books").query(&[("courseId", course.get())])).await
    }

    #[instrument(skip(self))]
    async fn list_articles(&self, course: EntityId) -> Result<Vec<Article>> {
        Self::send(self.request(Method::GET, "articles").query(&[("courseId", course.get())])).await
    }

    #[instrument(skip(self))]
    async fn list_assignments(&self, course: EntityId) -> Result<Vec<Assignment>> {
        Self::send(self.request(Method::GET, "assignments").query(&[("courseId", course.get())])).await
    }

    #[instrument(skip(self, book), fields(title = %book.title))]
    async fn create_book(&self, book: &NewBook) -> Result<Book> {
        Self::send(self.request(Method::POST, "books").json(book)).await
    }

    #[instrument(skip(self, article), fields(title = %article.title))]
    async fn create_article(&self, article: &NewArticle) -> Result<Article> {
        Self::send(self.request(Method::POST, "articles").json(article)).await
    }

    #[instrument(skip(self, assignment), fields(title = %assignment.title))]
    async fn create_assignment(&self, assignment: &NewAssignment) -> Result<Assignment> {
        Self::send(self.request(Method::POST, "assignments").json(assignment)).await
    }

    #[instrument(skip(self))]
    async fn my_courses(&self, university: &str) -> Result<Vec<Course>> {
        Self::send(self.request(Method::GET, "courses").query(&[("universityId", university)])).await
    }

    #[instrument(skip(self))]
    async fn course_catalog(&self, university: &str) -> Result<Vec<Course>> {
        let req = self
            .request(Method::GET, "course-catalog")
            .query(&[("universityId", university)]);
        Self::send(req).await
    }

    #[instrument(skip(self, course), fields(code = %course.code))]
    async fn create_course(&self, course: &NewCourse) -> Result<Course> {
        Self::send(self.request(Method::POST, "courses").json(course)).await
    }

    #[instrument(skip(self))]
    async fn delete_course(&self, course: EntityId) -> Result<()> {
        Self::send_empty(self.request(Method::DELETE, "courses").json(&json!({ "courseId": course }))).await
    }

    #[instrument(skip(self))]
    async fn enroll(&self, course: EntityId) -> Result<Enrollment> {
        Self::send(self.request(Method::POST, "user-courses").json(&json!({ "courseId": course }))).await
    }

    #[instrument(skip(self))]
    async fn unenroll(&self, course: EntityId) -> Result<()> {
        let req = self
            .request(Method::DELETE, "user-courses")
            .json(&json!({ "courseId": course }));
        Self::send_empty(req).await
    }

    #[instrument(skip(self))]
    async fn universities(&self) -> Result<Vec<University>> {
        Self::send(self.request(Method::GET, "universities")).await
    }

    #[instrument(skip(self))]
    async fn my_universities(&self) -> Result<Vec<Membership>> {
        Self::send(self.request(Method::GET, "user-universities")).await
    }

    #[instrument(skip(self))]
    async fn join_university(&self, university: &str) -> Result<Membership> {
        let req = self
            .request(Method::POST, "user-universities")
            .json(&json!({ "universityId": university }));
        Self::send(req).await
    }

    #[instrument(skip(self))]
    async fn calendar_token(&self) -> Result<Option<CalendarToken>> {
        let resp = self.request(Method::GET, "calendar/token").send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::from_status(status, body));
        }
        let bytes = resp.bytes().await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    #[instrument(skip(self))]
    async fn rotate_calendar_token(&self) -> Result<CalendarToken> {
        Self::send(self.request(Method::POST, "calendar/token/rotate")).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::StatusCode,
        routing::{delete, get, patch},
    };
    use parking_lot::Mutex;
    use serde_json::Value;

    use super::*;

    #[derive(Default)]
    struct Backend {
        completed: Mutex<Vec<u32>>,
        requests: Mutex<Vec<Value>>,
    }

    async fn book_progress(
        State(state): State<Arc<Backend>>,
        Path(_id): Path<i64>,
        Json(body): Json<Value>,
    ) -> Json<Vec<u32>> {
        state.requests.lock().push(body.clone());
        let chapter = body["chapter"].as_u64().unwrap() as u32;
        let mut completed = state.completed.lock();
        match body["action"].as_str().unwrap() {
            "add" => completed.push(chapter),
            _ => completed.retain(|&c| c != chapter),
        }
        // a concurrent edit the client has not seen
        Json(completed.iter().copied().chain([42, 42]).collect())
    }

    async fn article_progress(Path(id): Path<i64>, Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
        match id {
            404 => Err(StatusCode::NOT_FOUND),
            403 => Err(StatusCode::FORBIDDEN),
            _ => Ok(Json(serde_json::json!({ "completed": body["completed"] }))),
        }
    }

    async fn chapter_deadline(Path(id): Path<i64>, Json(body): Json<Value>) -> Json<Value> {
        Json(serde_json::json!({ "id": id, "deadline": body["deadline"] }))
    }

    async fn delete_book(State(state): State<Arc<Backend>>, Json(body): Json<Value>) -> (StatusCode, String) {
        state.requests.lock().push(body.clone());
        if body["bookId"] == 1 {
            (StatusCode::CONFLICT, "book has progress".into())
        } else {
            (StatusCode::NO_CONTENT, String::new())
        }
    }

    async fn list_books(Query(q): Query<std::collections::HashMap<String, String>>) -> Json<Value> {
        let course: i64 = q["courseId"].parse().unwrap();
        Json(serde_json::json!([
            { "id": 3, "courseId": course, "title": "SICP", "author": "Abelson", "numChapters": 5,
              "completedChapters": [2, 1] }
        ]))
    }

    async fn calendar_token() -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    async fn serve(state: Arc<Backend>) -> HttpApi {
        let app = Router::new()
            .route("/api/books", get(list_books).delete(delete_book))
            .route("/api/books/{id}/progress", patch(book_progress))
            .route("/api/articles/{id}/progress", patch(article_progress))
            .route("/api/chapters/{id}/deadline", patch(chapter_deadline))
            .route("/api/calendar/token", get(calendar_token))
            .route("/api/courses", delete(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        HttpApi::new(format!("http://{addr}/api/"), Duration::from_secs(5), Some("abc")).unwrap()
    }

    fn id(n: i64) -> EntityId {
        EntityId::new(n).unwrap()
    }

    #[tokio::test]
    async fn book_progress_returns_normalized_server_set() {
        let state = Arc::new(Backend::default());
        let api = serve(state.clone()).await;
        let after = api.add_book_progress(id(7), 3).await.unwrap();
        assert_eq!(after.iter().collect::<Vec<_>>(), vec![3, 42]);
        let after = api.remove_book_progress(id(7), 3).await.unwrap();
        assert_eq!(after.iter().collect::<Vec<_>>(), vec![42]);
        let requests = state.requests.lock();
        assert_eq!(requests[0], serde_json::json!({"chapter": 3, "action": "add"}));
        assert_eq!(requests[1]["action"], "remove");
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let api = serve(Arc::default()).await;
        assert!(api.set_progress(EntityKind::Article, id(5), true).await.unwrap());
        assert!(matches!(
            api.set_progress(EntityKind::Article, id(404), true).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            api.set_progress(EntityKind::Article, id(403), true).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            api.delete_course(id(1)).await,
            Err(Error::Server { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn delete_sends_id_body_and_surfaces_conflict() {
        let state = Arc::new(Backend::default());
        let api = serve(state.clone()).await;
        let err = api.delete(EntityKind::Book, id(1)).await.unwrap_err();
        assert_eq!(err, Error::Conflict("book has progress".into()));
        api.delete(EntityKind::Book, id(2)).await.unwrap();
        assert_eq!(state.requests.lock()[1], serde_json::json!({"bookId": 2}));
    }

    #[tokio::test]
    async fn deadline_round_trips_null() {
        let api = serve(Arc::default()).await;
        let cleared = api.set_deadline(EntityKind::Chapter, id(8), Deadline::NONE).await.unwrap();
        assert_eq!(cleared, Deadline::NONE);
        let set = api
            .set_deadline(EntityKind::Chapter, id(8), Deadline::at(1_700_000_000))
            .await
            .unwrap();
        assert_eq!(set, Deadline::at(1_700_000_000));
    }

    #[tokio::test]
    async fn lists_and_anonymous_calendar() {
        let api = serve(Arc::default()).await;
        let books = api.list_books(id(9)).await.unwrap();
        assert_eq!(books[0].course_id, id(9));
        assert_eq!(books[0].num_chapters, Some(5));
        assert_eq!(books[0].completed_chapters, [1, 2].into_iter().collect());
        assert_eq!(api.calendar_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn books_have_no_single_flag_and_transport_errors_are_reported() {
        let api = HttpApi::new("http://127.0.0.1:9", Duration::from_millis(500), None).unwrap();
        assert!(api.set_progress(EntityKind::Book, id(1), true).await.unwrap_err().is_validation());
        assert!(matches!(
            api.set_progress(EntityKind::Article, id(1), true).await,
            Err(Error::Transport(_))
        ));
    }
}
