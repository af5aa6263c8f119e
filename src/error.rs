use warp::http::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request was understood but rejected, nothing was written.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// HTTP status returned to the caller for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to a caller. Storage details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            Error::Validation(msg) | Error::NotFound(msg) => msg.clone(),
            _ => "Internal Server Error".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
