//! Upload jobs and chunk planning

use crate::error::{CliError, Result};
use serde::Serialize;
use std::fmt;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use url::Url;
use uuid::Uuid;

/// Default chunk size: 1 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// A contiguous byte range of the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkSpan {
    /// Zero-based chunk index
    pub index: usize,

    /// Byte offset of the first byte
    pub offset: u64,

    /// Number of bytes in the chunk
    pub len: u64,
}

impl ChunkSpan {
    /// Span `index` of a `file_size`-byte file cut into `chunk_size` chunks.
    ///
    /// `None` once `index` is past the last chunk. Computed on demand so a
    /// job never materializes its whole chunk plan.
    pub fn at(index: usize, file_size: u64, chunk_size: NonZeroU64) -> Option<Self> {
        let offset = u64::try_from(index).ok()?.checked_mul(chunk_size.get())?;
        if offset >= file_size {
            return None;
        }

        Some(Self {
            index,
            offset,
            len: chunk_size.get().min(file_size - offset),
        })
    }

    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }

    /// `Content-Range` header value for this span within a file of `total` bytes
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.offset, self.end().saturating_sub(1), total)
    }
}

impl fmt::Display for ChunkSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.offset, self.end())
    }
}

/// `ceil(file_size / chunk_size)`, zero for an empty file.
///
/// Fails when the count does not fit in `usize`.
pub fn chunk_count(file_size: u64, chunk_size: NonZeroU64) -> Result<usize> {
    let count = file_size.div_ceil(chunk_size.get());
    usize::try_from(count).map_err(|_| {
        CliError::config(format!(
            "{file_size} bytes in {chunk_size}-byte chunks needs {count} chunks; raise chunk_size"
        ))
    })
}

/// One file to upload. Immutable once created.
#[derive(Debug, Clone)]
pub struct UploadJob {
    id: Uuid,
    path: PathBuf,
    file_name: String,
    size: u64,
    checksum: Option<String>,
    endpoint: Url,
    chunk_size: NonZeroU64,
}

impl UploadJob {
    /// Create a job for `path`, snapshotting its current size.
    ///
    /// Fails when the path does not exist or is not a regular file.
    pub fn new(path: impl Into<PathBuf>, endpoint: Url, chunk_size: NonZeroU64) -> Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CliError::FileNotFound(path.display().to_string()),
            _ => CliError::Io(e),
        })?;

        if !metadata.is_file() {
            return Err(CliError::NotAFile(path.display().to_string()));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            id: Uuid::new_v4(),
            path,
            file_name,
            size: metadata.len(),
            checksum: None,
            endpoint,
            chunk_size,
        })
    }

    /// Attach the SHA-256 of the whole file. Reads the file once.
    pub fn with_checksum(mut self) -> Result<Self> {
        self.checksum = Some(logup_common::checksum::sha256_file(&self.path)?);
        Ok(self)
    }

    /// Upload id shared by every chunk of this job
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name sent to the server
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File size at job creation
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn chunk_size(&self) -> NonZeroU64 {
        self.chunk_size
    }

    /// Number of chunks in this job
    pub fn chunk_count(&self) -> Result<usize> {
        chunk_count(self.size, self.chunk_size)
    }

    /// Span of chunk `index`, `None` past the last chunk
    pub fn span(&self, index: usize) -> Option<ChunkSpan> {
        ChunkSpan::at(index, self.size, self.chunk_size)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn nz(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).unwrap()
    }

    fn endpoint() -> Url {
        Url::parse("http://localhost:9000/upload").unwrap()
    }

    fn plan(size: u64, chunk: u64) -> Vec<ChunkSpan> {
        let count = chunk_count(size, nz(chunk)).unwrap();
        (0..count).map(|i| ChunkSpan::at(i, size, nz(chunk)).unwrap()).collect()
    }

    #[test]
    fn test_chunk_count_is_ceil_division() {
        for size in [0u64, 1, 9, 10, 11, 99, 100, 101, 4096] {
            for chunk in [1u64, 3, 10, 64, 5000] {
                let spans = plan(size, chunk);
                assert_eq!(spans.len() as u64, size.div_ceil(chunk), "size={size} chunk={chunk}");
                assert_eq!(spans.iter().map(|s| s.len).sum::<u64>(), size);
                assert_eq!(ChunkSpan::at(spans.len(), size, nz(chunk)), None);
            }
        }
    }

    #[test]
    fn test_spans_are_contiguous_and_last_is_short() {
        let spans = plan(10, 4);
        assert_eq!(
            spans,
            vec![
                ChunkSpan { index: 0, offset: 0, len: 4 },
                ChunkSpan { index: 1, offset: 4, len: 4 },
                ChunkSpan { index: 2, offset: 8, len: 2 },
            ]
        );
        assert_eq!(spans[2].content_range(10), "bytes 8-9/10");
        assert_eq!(spans[1].to_string(), "4..8");
    }

    #[test]
    fn test_empty_file_has_no_chunks() {
        assert_eq!(chunk_count(0, nz(DEFAULT_CHUNK_SIZE)).unwrap(), 0);
        assert_eq!(ChunkSpan::at(0, 0, nz(DEFAULT_CHUNK_SIZE)), None);
    }

    #[test]
    fn test_chunk_larger_than_file_is_single_chunk() {
        assert_eq!(plan(100, DEFAULT_CHUNK_SIZE), vec![ChunkSpan { index: 0, offset: 0, len: 100 }]);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_span_of_huge_file_is_computed_without_a_plan() {
        let size = 1u64 << 40;
        let last = ChunkSpan::at((1 << 40) - 1, size, nz(1)).unwrap();
        assert_eq!(last.offset, size - 1);
        assert_eq!(last.len, 1);
        assert_eq!(ChunkSpan::at(usize::MAX, size, nz(1 << 20)), None);
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn test_chunk_count_beyond_usize_is_config_error() {
        let result = chunk_count(u64::MAX, nz(1));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_job_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let job = UploadJob::new(file.path(), endpoint(), nz(4)).unwrap();
        assert_eq!(job.size(), 10);
        assert_eq!(job.chunk_count().unwrap(), 3);
        assert_eq!(job.span(2), Some(ChunkSpan { index: 2, offset: 8, len: 2 }));
        assert_eq!(job.span(3), None);
        assert!(job.checksum().is_none());

        let job = job.with_checksum().unwrap();
        assert_eq!(
            job.checksum(),
            Some(logup_common::checksum::sha256_bytes(b"0123456789").as_str())
        );
    }

    #[test]
    fn test_job_missing_file() {
        let result = UploadJob::new("/no/such/app.log", endpoint(), nz(4));
        assert!(matches!(result, Err(CliError::FileNotFound(_))));
    }

    #[test]
    fn test_job_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let result = UploadJob::new(dir.path(), endpoint(), nz(4));
        assert!(matches!(result, Err(CliError::NotAFile(_))));
    }

    #[test]
    fn test_jobs_get_distinct_ids() {
        let file = NamedTempFile::new().unwrap();
        let a = UploadJob::new(file.path(), endpoint(), nz(4)).unwrap();
        let b = UploadJob::new(file.path(), endpoint(), nz(4)).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
