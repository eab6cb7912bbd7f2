//! Error types for the storage and catalog layers.

use thiserror::Error;

/// Result type alias using StacError.
pub type StacResult<T> = Result<T, StacError>;

/// Primary error type for storage-facing operations.
#[derive(Debug, Error)]
pub enum StacError {
    // === Storage Errors ===
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    // === Catalog Errors ===
    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Invalid catalog document {path}: {message}")]
    InvalidDocument { path: String, message: String },

    // === Notification Errors ===
    #[error("Publish to '{topic}' failed: {message}")]
    PublishError { topic: String, message: String },

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl StacError {
    /// Whether this error means the requested object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StacError::NotFound(_))
    }
}

impl From<std::io::Error> for StacError {
    fn from(err: std::io::Error) -> Self {
        StacError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for StacError {
    fn from(err: serde_json::Error) -> Self {
        StacError::InternalError(format!("JSON error: {}", err))
    }
}
