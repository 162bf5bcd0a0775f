//! Chunked upload engine
//!
//! A file becomes an [`UploadJob`], the job is split into chunks, and an
//! [`Uploader`] sends every chunk through a [`ChunkTransport`] with per-chunk
//! retry. The caller only ever sees the folded [`UploadResult`].

pub mod backoff;
pub mod chunk;
pub mod job;
pub mod result;
pub mod transport;
pub mod uploader;

pub use backoff::RetryPolicy;
pub use chunk::{AttemptOutcome, ChunkAttempt, ChunkMachine, ChunkState};
pub use job::{chunk_count, ChunkSpan, UploadJob};
pub use result::{ChunkOutcome, ChunkReport, UploadResult, UploadStatus};
pub use transport::{classify_status, ChunkPayload, ChunkTransport, FailureKind, TransportError};
pub use uploader::{upload, Uploader, DEFAULT_CONCURRENCY};
