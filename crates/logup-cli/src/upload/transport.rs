//! Transport seam between the retry engine and the network

use super::job::{ChunkSpan, UploadJob};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Bytes of one chunk plus the metadata sent alongside it.
///
/// `data` is reference counted, so resending it on retry does not copy.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub span: ChunkSpan,
    pub total_chunks: usize,
    pub data: Bytes,
    /// Hex SHA-256 of `data`
    pub checksum: String,
}

impl ChunkPayload {
    pub fn new(span: ChunkSpan, total_chunks: usize, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let checksum = logup_common::checksum::sha256_bytes(&data);
        Self {
            span,
            total_chunks,
            data,
            checksum,
        }
    }
}

/// Whether retrying an unchanged request can succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
}

/// Classify an HTTP status code. `None` means success.
///
/// 2xx succeeds, 429 and 5xx are transient, everything else is permanent
/// (4xx, plus 1xx/3xx which a chunk endpoint never legitimately returns).
pub fn classify_status(status: u16) -> Option<FailureKind> {
    match status {
        200..=299 => None,
        429 | 500..=599 => Some(FailureKind::Transient),
        _ => Some(FailureKind::Permanent),
    }
}

/// Failure of a single send
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("malformed response: {0}")]
    InvalidResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Error for a non-success status code
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attach a server-provided retry hint. No-op for non-status errors.
    pub fn with_retry_after(mut self, hint: Option<Duration>) -> Self {
        if let Self::Status { retry_after, .. } = &mut self {
            *retry_after = hint;
        }
        self
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Status { status, .. } => {
                classify_status(*status).unwrap_or(FailureKind::Permanent)
            }
            Self::Timeout(_) | Self::Connection(_) => FailureKind::Transient,
            Self::InvalidResponse(_) | Self::InvalidRequest(_) => FailureKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }

    /// Server-provided wait before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Sends one chunk. Implementations must be safe to call concurrently.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn send_chunk(&self, job: &UploadJob, chunk: &ChunkPayload) -> Result<(), TransportError>;
}
