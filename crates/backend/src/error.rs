use ossindex_core::Error as CoreError;
use thiserror::Error;

/// Backend-specific error types
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend API error: {0}")]
    Api(String),
}

impl BackendError {
    /// Whether the same call may succeed if simply retried later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<BackendError> for CoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(msg) => CoreError::transient(msg),
            BackendError::Conflict(msg) => CoreError::conflict(msg),
            e @ (BackendError::CollectionNotFound(_)
            | BackendError::IndexNotFound(_)
            | BackendError::InvalidRequest(_)
            | BackendError::Api(_)) => CoreError::backend(e.to_string()),
        }
    }
}
