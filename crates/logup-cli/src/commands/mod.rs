//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` (or `show`) function.

pub mod config;
pub mod sample;
pub mod upload;
