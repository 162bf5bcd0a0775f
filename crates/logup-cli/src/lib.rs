//! logup CLI Library
//!
//! Uploads log files to an HTTP collection endpoint in chunks, retrying each
//! chunk independently with capped exponential backoff.
//!
//! # Overview
//!
//! - **Uploads**: split files into chunks and send them concurrently (`logup upload`)
//! - **Sample data**: generate log files to try it out (`logup sample`)
//! - **Configuration**: inspect layered settings (`logup config`)
//!
//! The upload engine lives in [`upload`] and only depends on the
//! [`upload::ChunkTransport`] trait; [`api::HttpTransport`] is the reqwest
//! implementation the binary uses.

pub mod api;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod error;
pub mod progress;
pub mod summary;
pub mod upload;

// Re-export commonly used types
pub use error::{CliError, Result};
pub use upload::{RetryPolicy, UploadJob, UploadResult, UploadStatus, Uploader};

use api::HttpMethod;
use clap::{Args, Parser, Subcommand, ValueEnum};
use commands::upload::UploadOptions;
use config::ConfigOverrides;
use std::path::PathBuf;

/// logup - chunked log uploader with retry
#[derive(Parser, Debug)]
#[command(name = "logup")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to ./logup.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the CLI reference as markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload log files in chunks
    Upload(UploadArgs),

    /// Write sample log files
    Sample {
        /// Target directory
        #[arg(default_value = commands::sample::DEFAULT_SAMPLE_DIR)]
        dir: PathBuf,
    },

    /// Show the effective configuration
    Config,
}

/// Summary output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Arguments for `logup upload`
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Files or directories to upload
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Collection endpoint URL
    #[arg(short, long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Chunk size in bytes or with a unit (512KiB, 4MiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_chunk_size)]
    pub chunk_size: Option<u64>,

    /// Attempts per chunk, including the first
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry, in seconds
    #[arg(long, value_name = "SECS")]
    pub base_delay: Option<f64>,

    /// Upper bound for any single retry delay, in seconds
    #[arg(long, value_name = "SECS")]
    pub max_delay: Option<f64>,

    /// Concurrent chunk uploads per file
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// HTTP method for chunk requests
    #[arg(long, value_enum)]
    pub method: Option<HttpMethod>,

    /// Per-request timeout, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Random jitter as a fraction of each delay (0 to 1)
    #[arg(long, value_name = "RATIO")]
    pub jitter: Option<f64>,

    /// Send the SHA-256 of the whole file with every chunk
    #[arg(long)]
    pub checksum: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl UploadArgs {
    /// Combine with the global `--config` flag
    pub fn into_options(self, config_path: Option<PathBuf>) -> UploadOptions {
        UploadOptions {
            overrides: ConfigOverrides {
                endpoint: self.endpoint,
                chunk_size: self.chunk_size,
                max_attempts: self.max_attempts,
                base_delay_secs: self.base_delay,
                max_delay_secs: self.max_delay,
                concurrency: self.concurrency,
                timeout_secs: self.timeout,
                jitter: self.jitter,
                method: self.method,
            },
            paths: self.paths,
            config_path,
            checksum: self.checksum,
            recursive: self.recursive,
            format: self.format,
            show_progress: !self.no_progress,
        }
    }
}

fn parse_chunk_size(value: &str) -> std::result::Result<u64, String> {
    logup_common::types::parse_byte_size(value).map_err(|e| e.to_string())
}
