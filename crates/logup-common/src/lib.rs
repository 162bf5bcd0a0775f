//! logup Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the logup workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`LogupError`] and the [`Result`] alias
//! - **Checksums**: SHA-256 helpers for files and chunk buffers
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Types**: byte-size parsing for human-friendly chunk sizes
//!
//! # Example
//!
//! ```no_run
//! use logup_common::{checksum, types::parse_byte_size, Result};
//!
//! fn describe(path: &str) -> Result<()> {
//!     let digest = checksum::sha256_file(path)?;
//!     let chunk = parse_byte_size("4MiB")?;
//!     println!("{path}: sha256={digest}, chunk={chunk}");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{LogupError, Result};
