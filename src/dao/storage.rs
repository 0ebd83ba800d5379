use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend could not serve the request; callers may retry.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Addressed record does not exist.
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    /// A compare-and-swap lost against a concurrent writer.
    #[error("conflicting update: {message}")]
    Conflict { message: String },
    /// A uniqueness constraint rejected the write.
    #[error("duplicate {field} `{value}`")]
    Duplicate { field: &'static str, value: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a not-found error for the given entity kind.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StorageError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Construct a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        StorageError::Conflict {
            message: message.into(),
        }
    }
}
