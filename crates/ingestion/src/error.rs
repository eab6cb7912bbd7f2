//! Error types for the ingestion crate.

use thiserror::Error;

use stac_common::StacError;

/// Errors that can occur while turning one scene into a catalog entry.
///
/// Every variant is scoped to a single scene; batch runs log it and move on.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Resource not found: {0}")]
    FetchNotFound(String),

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing required metadata field: {0}")]
    MissingField(String),

    #[error("No footprint for path {path} row {row}")]
    NoFootprint { path: String, row: String },

    #[error("Failed to insert {id}: {message}")]
    Insertion { id: String, message: String },

    #[error("Failed to publish: {0}")]
    Publish(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StacError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IngestionError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, IngestionError::FetchNotFound(_))
    }
}

impl From<serde_json::Error> for IngestionError {
    fn from(err: serde_json::Error) -> Self {
        IngestionError::Parse(format!("JSON error: {}", err))
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
