//! Error types for the logup CLI
//!
//! Errors are user-facing: each message says what went wrong and what to try next.
//! Per-chunk transport failures are not represented here; they are absorbed into
//! [`crate::upload::UploadResult`] and never cross the uploader boundary.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Exit code used when every file uploaded completely
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code used when a file was not fully uploaded or a command failed
pub const EXIT_FAILURE: i32 = 1;

/// Exit code used for invalid configuration or usage
pub const EXIT_USAGE: i32 = 2;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check flags, LOGUP_* environment variables and logup.toml.")]
    Config(String),

    /// Required file is missing
    #[error("File not found: '{0}'. Verify the path exists and you have read permissions.")]
    FileNotFound(String),

    /// Path exists but is not a regular file
    #[error("Not a regular file: '{0}'")]
    NotAFile(String),

    /// Discovery produced nothing to upload
    #[error("No log files found in {0}. Pass files directly or adjust the extensions setting.")]
    NoFilesFound(String),

    /// A chunk buffer could not be allocated
    #[error("Out of memory: {0}. Lower --chunk-size or --concurrency.")]
    ResourceExhausted(String),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML config file could not be parsed
    #[error("Failed to parse config file: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Effective configuration could not be rendered
    #[error("Failed to render configuration: {0}")]
    TomlRender(#[from] toml::ser::Error),

    /// JSON summary could not be rendered
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Error bubbled up from the common crate
    #[error(transparent)]
    Common(#[from] logup_common::LogupError),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a resource exhaustion error
    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::TomlParse(_) => EXIT_USAGE,
            CliError::Common(logup_common::LogupError::InvalidSize { .. }) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}
