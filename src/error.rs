#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed input, rejected before anything is rendered.
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Dependent-state violation, e.g. deleting an entity someone has completed.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("server responded with HTTP {status}: {body}")]
    Server { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Map a non-success HTTP status and its body to the error taxonomy.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into().trim().to_string();
        match status {
            400 => Error::BadRequest(body),
            401 => Error::Unauthorized,
            403 => Error::Forbidden(body),
            404 => Error::NotFound(body),
            409 => Error::Conflict(body),
            _ => Error::Server { status, body },
        }
    }

    /// Validation errors abort before any optimistic render; every other
    /// kind is a settlement failure that rolls the view back.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Error::from_status(status.as_u16(), e.to_string()),
            None => Error::Transport(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Transport(format!("malformed response body: {e}"))
    }
}
