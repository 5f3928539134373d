use thiserror::Error;

/// Result type for ossindex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ossindex operations
///
/// Backend failures are classified into one of four buckets at the point
/// where they cross into the reconciler: transient (retried by returning
/// an in-progress result), conflict (backend state contradicts the
/// requested operation), invalid property (terminal user error, never
/// retried), and timeout (deadline exceeded across invocations).
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Terminal user error: a request property failed validation.
    /// The message always names the offending field.
    #[error("Invalid property '{field}': {message}")]
    InvalidProperty { field: String, message: String },

    /// Transient backend or network failure; safe to retry
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// Backend state contradicts the requested operation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Non-transient backend error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Deadline exceeded across repeated in-progress cycles
    #[error("Timed out during {operation}: {message}")]
    Timeout { operation: String, message: String },

    /// Continuation marker could not be decoded
    #[error("Corrupt continuation marker: {0}")]
    CorruptContinuation(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an invalid-property error
    pub fn invalid_property(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProperty {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a transient error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Creates a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Creates a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Creates a timeout error
    pub fn timeout(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether re-invoking the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}
