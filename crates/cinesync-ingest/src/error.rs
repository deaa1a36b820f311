//! Error types for the ingestion job

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: StatusCode },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot decompose movie {movie_id}: {reason}")]
    Decompose { movie_id: i32, reason: String },

    #[error("Stream {0} closed before the producer finished")]
    StreamClosed(&'static str),
}

impl From<cinesync_common::CommonError> for IngestError {
    fn from(err: cinesync_common::CommonError) -> Self {
        IngestError::Config(err.to_string())
    }
}

impl IngestError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
