//! Per-chunk reports and the aggregate per-file result

use super::job::UploadJob;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Final outcome of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkOutcome {
    Succeeded,
    /// Permanently failed: non-retryable error or retry budget exhausted
    Failed,
    /// Never finished because the job was cancelled or aborted
    Cancelled,
}

/// Folded result of every attempt made for one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkReport {
    pub index: usize,
    pub offset: u64,
    pub len: u64,
    pub attempts: u32,
    pub outcome: ChunkOutcome,
    pub last_error: Option<String>,
}

impl ChunkReport {
    /// Report for a chunk no worker ever claimed
    pub fn unclaimed(index: usize, offset: u64, len: u64, reason: &str) -> Self {
        Self {
            index,
            offset,
            len,
            attempts: 0,
            outcome: ChunkOutcome::Cancelled,
            last_error: Some(reason.to_string()),
        }
    }

    /// `start-end` byte range, end inclusive
    pub fn byte_range(&self) -> String {
        format!("{}-{}", self.offset, (self.offset + self.len).saturating_sub(1))
    }
}

/// Overall status of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Every chunk succeeded (trivially true for an empty file)
    Complete,
    /// Some chunks succeeded and some failed permanently
    PartialFailure,
    /// Every chunk failed permanently
    Failed,
    /// The file could not be read, or the upload was cancelled
    Aborted,
}

impl UploadStatus {
    pub fn is_complete(self) -> bool {
        self == UploadStatus::Complete
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStatus::Complete => write!(f, "Complete"),
            UploadStatus::PartialFailure => write!(f, "PartialFailure"),
            UploadStatus::Failed => write!(f, "Failed"),
            UploadStatus::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Aggregate outcome of one file; the only value that leaves the uploader
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub path: PathBuf,
    pub upload_id: Option<Uuid>,
    pub status: UploadStatus,
    pub total_chunks: usize,
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    pub chunks_cancelled: usize,
    pub total_attempts: u64,
    pub bytes_uploaded: u64,
    /// Chunks that did not succeed, ordered by index
    pub failures: Vec<ChunkReport>,
    pub abort_reason: Option<String>,
    pub elapsed_ms: u64,
}

impl UploadResult {
    /// Result for a job that never started (missing file, unreadable, cancelled early)
    pub fn aborted(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            upload_id: None,
            status: UploadStatus::Aborted,
            total_chunks: 0,
            chunks_succeeded: 0,
            chunks_failed: 0,
            chunks_cancelled: 0,
            total_attempts: 0,
            bytes_uploaded: 0,
            failures: Vec::new(),
            abort_reason: Some(reason.into()),
            elapsed_ms: 0,
        }
    }

    /// Result for a job cancelled before any chunk was claimed.
    ///
    /// Every chunk counts as cancelled. Per-chunk reports are omitted since
    /// none of them was attempted.
    pub fn cancelled(job: &UploadJob, total_chunks: usize, reason: impl Into<String>) -> Self {
        Self {
            upload_id: Some(job.id()),
            total_chunks,
            chunks_cancelled: total_chunks,
            ..Self::aborted(job.path(), reason)
        }
    }

    /// Fold chunk reports into a result.
    ///
    /// `reports` must hold exactly one entry per planned chunk. Any abort reason
    /// makes the status `Aborted`; otherwise the status depends only on the
    /// per-chunk outcomes.
    pub fn from_reports(
        job: &UploadJob,
        mut reports: Vec<ChunkReport>,
        abort_reason: Option<String>,
        elapsed: Duration,
    ) -> Self {
        reports.sort_by_key(|r| r.index);

        let mut succeeded = 0;
        let mut failed = 0;
        let mut cancelled = 0;
        let mut attempts = 0u64;
        let mut bytes_uploaded = 0u64;
        for report in &reports {
            attempts += u64::from(report.attempts);
            match report.outcome {
                ChunkOutcome::Succeeded => {
                    succeeded += 1;
                    bytes_uploaded += report.len;
                }
                ChunkOutcome::Failed => failed += 1,
                ChunkOutcome::Cancelled => cancelled += 1,
            }
        }

        let status = if abort_reason.is_some() || cancelled > 0 {
            UploadStatus::Aborted
        } else if failed == 0 {
            UploadStatus::Complete
        } else if succeeded > 0 {
            UploadStatus::PartialFailure
        } else {
            UploadStatus::Failed
        };

        let abort_reason = match status {
            UploadStatus::Aborted => {
                abort_reason.or_else(|| Some("upload cancelled".to_string()))
            }
            _ => None,
        };

        Self {
            path: job.path().to_path_buf(),
            upload_id: Some(job.id()),
            status,
            total_chunks: reports.len(),
            chunks_succeeded: succeeded,
            chunks_failed: failed,
            chunks_cancelled: cancelled,
            total_attempts: attempts,
            bytes_uploaded,
            failures: reports
                .into_iter()
                .filter(|r| r.outcome != ChunkOutcome::Succeeded)
                .collect(),
            abort_reason,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }
}
