//! `logup upload` command implementation
//!
//! Resolves configuration, expands paths into files, and uploads the files
//! one after another. Chunks within a file run concurrently. Ctrl-C cancels
//! the current file and marks the rest aborted.

use crate::api::HttpTransport;
use crate::config::{ConfigOverrides, UploadConfig, UploadSettings};
use crate::discovery::{discover, Discovered};
use crate::error::{CliError, Result, EXIT_FAILURE, EXIT_SUCCESS};
use crate::progress::create_upload_progress;
use crate::summary;
use crate::upload::{ChunkTransport, UploadJob, UploadResult, Uploader};
use crate::OutputFormat;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const CANCELLED_REASON: &str = "upload cancelled";

/// Everything `logup upload` needs beyond the layered config
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub paths: Vec<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
    /// Compute and send the whole-file SHA-256
    pub checksum: bool,
    pub recursive: bool,
    pub format: OutputFormat,
    pub show_progress: bool,
}

/// Run the command and return the process exit code
pub async fn run(options: UploadOptions) -> Result<i32> {
    let settings = resolve_settings(options.config_path.as_deref(), &options.overrides)?;
    info!(
        endpoint = %settings.endpoint,
        chunk_size = settings.chunk_size.get(),
        max_attempts = settings.policy.max_attempts(),
        concurrency = settings.concurrency,
        "Resolved upload settings"
    );

    let cancel = CancellationToken::new();
    let listener = spawn_interrupt_listener(cancel.clone());
    let results = upload_paths(&settings, &options, cancel).await;
    listener.abort();
    let results = results?;

    println!("{}", summary::render(&results, options.format)?);
    if options.format == OutputFormat::Table {
        eprintln!("{}", summary::status_line(&results));
    }

    Ok(exit_code(&results))
}

/// Apply file, environment and flag layers, then validate
pub fn resolve_settings(
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<UploadSettings> {
    let mut config = UploadConfig::load(config_path)?;
    config.apply_env()?;
    config.apply_overrides(overrides);
    config.validate()
}

/// 0 when every file is complete, 1 otherwise
pub fn exit_code(results: &[UploadResult]) -> i32 {
    if results.iter().all(|r| r.is_complete()) {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Upload every discovered file in order, one result per file
pub async fn upload_paths(
    settings: &UploadSettings,
    options: &UploadOptions,
    cancel: CancellationToken,
) -> Result<Vec<UploadResult>> {
    let discovered = discover(&options.paths, &settings.extensions, options.recursive);
    if discovered.is_empty() {
        let searched: Vec<String> = options.paths.iter().map(|p| p.display().to_string()).collect();
        return Err(CliError::NoFilesFound(searched.join(", ")));
    }

    let transport: Arc<dyn ChunkTransport> =
        Arc::new(HttpTransport::new(settings.timeout, settings.method)?);
    let uploader = Uploader::new(transport, settings.policy)
        .with_concurrency(settings.concurrency)
        .with_cancellation(cancel.clone());

    let mut results = Vec::with_capacity(discovered.len());
    for entry in discovered {
        let result = match entry {
            Discovered::Missing { path, .. } if cancel.is_cancelled() => {
                UploadResult::aborted(path, CANCELLED_REASON)
            }
            Discovered::Missing { path, reason } => {
                warn!(path = %path.display(), reason = %reason, "Skipping path");
                UploadResult::aborted(path, reason)
            }
            Discovered::File(path) => {
                upload_file(&uploader, settings, path, options.checksum, options.show_progress)
                    .await
            }
        };
        results.push(result);
    }

    Ok(results)
}

async fn upload_file(
    uploader: &Uploader,
    settings: &UploadSettings,
    path: PathBuf,
    checksum: bool,
    show_progress: bool,
) -> UploadResult {
    let job = match UploadJob::new(&path, settings.endpoint.clone(), settings.chunk_size) {
        Ok(job) => job,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot create upload job");
            return UploadResult::aborted(&path, e.to_string());
        }
    };

    // A cancelled job still reports its chunk count, but skips hashing
    let job = if checksum && !uploader.cancellation_token().is_cancelled() {
        match tokio::task::spawn_blocking(move || job.with_checksum()).await {
            Ok(Ok(job)) => job,
            Ok(Err(e)) => return UploadResult::aborted(&path, e.to_string()),
            Err(e) => return UploadResult::aborted(&path, format!("checksum task failed: {e}")),
        }
    } else {
        job
    };

    let progress = show_progress.then(|| create_upload_progress(job.size(), job.file_name()));
    let uploader = match &progress {
        Some(pb) => uploader.clone().with_progress(pb.clone()),
        None => uploader.clone(),
    };

    let result = uploader.upload(&job).await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    result
}

fn spawn_interrupt_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling uploads");
            eprintln!("{} Interrupted, cancelling uploads", "!".yellow());
            cancel.cancel();
        }
    })
}
