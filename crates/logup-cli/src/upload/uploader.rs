//! Bounded worker pool that drives chunk state machines
//!
//! Workers pull chunk indices from a shared atomic cursor, so each chunk is
//! claimed by exactly one worker. Finished chunks are sent to the collector
//! over a channel and folded into one [`UploadResult`] ordered by index, so
//! the result does not depend on completion order.

use super::backoff::RetryPolicy;
use super::chunk::{ChunkAttempt, ChunkMachine};
use super::job::{ChunkSpan, UploadJob};
use super::result::{ChunkOutcome, ChunkReport, UploadResult};
use super::transport::{ChunkPayload, ChunkTransport};
use crate::error::{CliError, Result};
use indicatif::ProgressBar;
use std::io::SeekFrom;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default number of concurrent chunk workers
pub const DEFAULT_CONCURRENCY: usize = 4;

const CANCELLED_REASON: &str = "upload cancelled";

/// Upload `job` with a fresh uploader using the default concurrency
pub async fn upload(
    job: &UploadJob,
    policy: RetryPolicy,
    transport: Arc<dyn ChunkTransport>,
) -> UploadResult {
    Uploader::new(transport, policy).upload(job).await
}

/// Chunked uploader with per-chunk retry
#[derive(Clone)]
pub struct Uploader {
    transport: Arc<dyn ChunkTransport>,
    policy: RetryPolicy,
    concurrency: usize,
    cancel: CancellationToken,
    progress: Option<ProgressBar>,
}

impl Uploader {
    pub fn new(transport: Arc<dyn ChunkTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Number of workers; values below 1 are raised to 1
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Use a caller-owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report uploaded bytes to a progress bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Upload every chunk of `job` and report the aggregate outcome.
    ///
    /// Never fails: precondition problems, read errors and cancellation all
    /// surface as [`super::UploadStatus::Aborted`].
    #[instrument(skip_all, fields(file = %job.path().display(), upload_id = %job.id()))]
    pub async fn upload(&self, job: &UploadJob) -> UploadResult {
        let started = Instant::now();

        let chunk_count = match job.chunk_count() {
            Ok(count) => count,
            Err(e) => return UploadResult::aborted(job.path(), e.to_string()),
        };

        if self.cancel.is_cancelled() {
            return UploadResult::cancelled(job, chunk_count, CANCELLED_REASON);
        }

        if let Err(e) = File::open(job.path()).await {
            warn!(error = %e, "Cannot open file, aborting job");
            return UploadResult::aborted(job.path(), format!("cannot open file: {e}"));
        }

        if chunk_count == 0 {
            info!("Empty file, nothing to upload");
            return UploadResult::from_reports(job, Vec::new(), None, started.elapsed());
        }

        // One report slot per chunk; a huge plan must abort the job, not the process
        let mut slots: Vec<Option<ChunkReport>> = Vec::new();
        if let Err(e) = slots.try_reserve_exact(chunk_count) {
            let error = CliError::resource_exhausted(format!(
                "cannot allocate bookkeeping for {chunk_count} chunks: {e}"
            ));
            error!(error = %error, "Aborting upload");
            return UploadResult::aborted(job.path(), error.to_string());
        }
        slots.resize_with(chunk_count, || None);

        if let Some(progress) = &self.progress {
            progress.set_length(job.size());
        }

        let worker_count = self.concurrency.min(chunk_count);
        info!(
            size = job.size(),
            chunks = chunk_count,
            workers = worker_count,
            "Starting upload"
        );

        // Aborting one job must not cancel the caller's token
        let job_token = self.cancel.child_token();
        let cursor = Arc::new(AtomicUsize::new(0));
        let shared_job = Arc::new(job.clone());
        let (events, mut collector) = mpsc::unbounded_channel();

        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            let worker = Worker {
                id,
                job: Arc::clone(&shared_job),
                chunk_count,
                cursor: Arc::clone(&cursor),
                transport: Arc::clone(&self.transport),
                policy: self.policy,
                token: job_token.clone(),
                events: events.clone(),
                progress: self.progress.clone(),
            };
            workers.spawn(worker.run());
        }
        drop(events);

        let mut abort_reason: Option<String> = None;

        while let Some(event) = collector.recv().await {
            match event {
                WorkerEvent::Finished(report) => {
                    let index = report.index;
                    match slots.get_mut(index) {
                        Some(slot) if slot.is_none() => *slot = Some(report),
                        _ => error!(chunk = index, "Ignoring duplicate chunk report"),
                    }
                }
                WorkerEvent::Fatal(reason) => {
                    error!(reason = %reason, "Aborting upload");
                    abort_reason.get_or_insert(reason);
                    job_token.cancel();
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Upload worker failed");
                abort_reason.get_or_insert_with(|| format!("upload worker failed: {e}"));
            }
        }

        let unclaimed_reason = abort_reason.as_deref().unwrap_or(CANCELLED_REASON);
        let reports: Vec<ChunkReport> = slots
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.or_else(|| {
                    job.span(index).map(|span| {
                        ChunkReport::unclaimed(span.index, span.offset, span.len, unclaimed_reason)
                    })
                })
            })
            .collect();

        let result = UploadResult::from_reports(job, reports, abort_reason, started.elapsed());
        info!(
            status = %result.status,
            succeeded = result.chunks_succeeded,
            failed = result.chunks_failed,
            cancelled = result.chunks_cancelled,
            attempts = result.total_attempts,
            elapsed_ms = result.elapsed_ms,
            "Upload finished"
        );
        result
    }
}

enum WorkerEvent {
    Finished(ChunkReport),
    /// The job cannot continue (read failure, allocation failure)
    Fatal(String),
}

struct Worker {
    id: usize,
    job: Arc<UploadJob>,
    chunk_count: usize,
    cursor: Arc<AtomicUsize>,
    transport: Arc<dyn ChunkTransport>,
    policy: RetryPolicy,
    token: CancellationToken,
    events: mpsc::UnboundedSender<WorkerEvent>,
    progress: Option<ProgressBar>,
}

impl Worker {
    async fn run(self) {
        let mut file = match File::open(self.job.path()).await {
            Ok(file) => file,
            Err(e) => {
                self.emit(WorkerEvent::Fatal(format!("cannot open file: {e}")));
                return;
            }
        };

        while !self.token.is_cancelled() {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed);
            if index >= self.chunk_count {
                break;
            }
            let Some(span) = self.job.span(index) else {
                break;
            };
            debug!(worker = self.id, chunk = index, range = %span, "Claimed chunk");

            let data = match read_span(&mut file, span).await {
                Ok(data) => data,
                Err(e) => {
                    let reason = format!("failed to read chunk {} ({span}): {e}", span.index);
                    let mut machine = ChunkMachine::new(span);
                    machine.cancel(reason.clone());
                    self.emit(WorkerEvent::Fatal(reason));
                    self.emit(WorkerEvent::Finished(machine.into_report()));
                    break;
                }
            };

            let report = self.drive(span, data).await;
            self.emit(WorkerEvent::Finished(report));
        }

        debug!(worker = self.id, "Worker finished");
    }

    fn emit(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            warn!(worker = self.id, "Result collector closed before worker finished");
        }
    }

    /// Run one chunk's state machine to a terminal state
    async fn drive(&self, span: ChunkSpan, data: Vec<u8>) -> ChunkReport {
        let payload = ChunkPayload::new(span, self.chunk_count, data);
        let mut machine = ChunkMachine::new(span);

        while !machine.state().is_terminal() {
            if let Some(delay) = machine.pending_delay() {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => {
                        machine.cancel(CANCELLED_REASON);
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if self.token.is_cancelled() {
                machine.cancel(CANCELLED_REASON);
                break;
            }

            let attempt = match machine.begin_attempt() {
                Ok(attempt) => attempt,
                Err(e) => {
                    error!(error = %e, "Chunk state machine rejected a new attempt");
                    break;
                }
            };

            let started = Instant::now();
            let sent = tokio::select! {
                biased;
                _ = self.token.cancelled() => None,
                result = self.transport.send_chunk(&self.job, &payload) => Some(result),
            };

            let Some(result) = sent else {
                debug!(chunk = span.index, attempt, "In-flight attempt aborted");
                machine.cancel(CANCELLED_REASON);
                break;
            };

            let record = ChunkAttempt {
                span,
                attempt,
                outcome: result.into(),
                latency: started.elapsed(),
            };
            if let Err(e) = machine.record(record, &self.policy) {
                error!(error = %e, "Chunk state machine rejected an attempt result");
                break;
            }
        }

        let report = machine.into_report();
        if report.outcome == ChunkOutcome::Succeeded {
            if let Some(progress) = &self.progress {
                progress.inc(span.len);
            }
        }
        report
    }
}

/// Read exactly the bytes of `span` into a freshly allocated buffer
async fn read_span(file: &mut File, span: ChunkSpan) -> Result<Vec<u8>> {
    let len = usize::try_from(span.len).map_err(|_| {
        CliError::resource_exhausted(format!("chunk of {} bytes exceeds address space", span.len))
    })?;

    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|e| {
        CliError::resource_exhausted(format!("cannot allocate {len} bytes for chunk {}: {e}", span.index))
    })?;
    buffer.resize(len, 0);

    file.seek(SeekFrom::Start(span.offset)).await?;
    file.read_exact(&mut buffer).await?;
    Ok(buffer)
}
