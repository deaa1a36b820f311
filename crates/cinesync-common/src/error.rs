//! Error types shared across cinesync crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required environment variable {0}")]
    MissingVar(String),

    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidSetting {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Failed to install log subscriber: {0}")]
    Subscriber(String),
}

impl CommonError {
    /// Build an [`CommonError::InvalidSetting`] for a named setting
    pub fn invalid(name: &str, value: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidSetting {
            name: name.to_string(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
