//! Error types shared across logup crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, LogupError>;

/// Main error type for logup-common
#[derive(Error, Debug)]
pub enum LogupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid byte size '{input}': {reason}")]
    InvalidSize { input: String, reason: String },
}

impl LogupError {
    /// Create an invalid size error
    pub fn invalid_size(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSize {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
