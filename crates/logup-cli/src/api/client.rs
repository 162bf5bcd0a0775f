//! HTTP transport for chunk uploads
//!
//! Each chunk is one request carrying the raw chunk bytes as the body and the
//! chunk metadata as headers. Status codes are mapped onto
//! [`TransportError`] so the retry engine never sees reqwest types.

use crate::api::headers;
use crate::error::Result;
use crate::upload::{ChunkPayload, ChunkTransport, TransportError, UploadJob};
use async_trait::async_trait;
use chrono::Utc;
use clap::ValueEnum;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::trace;

// ============================================================================
// Transport Constants
// ============================================================================

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every chunk
pub const USER_AGENT: &str = concat!("logup/", env!("CARGO_PKG_VERSION"));

/// Longest response body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 100;

/// HTTP method used for chunk requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Post,
    Put,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Post => write!(f, "post"),
            HttpMethod::Put => write!(f, "put"),
        }
    }
}

/// reqwest-backed [`ChunkTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    method: HttpMethod,
}

impl HttpTransport {
    /// Create a transport with a per-request timeout
    pub fn new(timeout: Duration, method: HttpMethod) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, method })
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    fn build_request(&self, job: &UploadJob, chunk: &ChunkPayload) -> RequestBuilder {
        let file_name: String =
            url::form_urlencoded::byte_serialize(job.file_name().as_bytes()).collect();

        let request = self
            .client
            .request(self.method.into(), job.endpoint().clone())
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_RANGE, chunk.span.content_range(job.size()))
            .header(headers::UPLOAD_ID, job.id().to_string())
            .header(headers::FILE_NAME, file_name)
            .header(headers::FILE_SIZE, job.size())
            .header(headers::CHUNK_INDEX, chunk.span.index)
            .header(headers::CHUNK_COUNT, chunk.total_chunks)
            .header(headers::CHUNK_SHA256, chunk.checksum.as_str())
            .header(headers::UPLOAD_TIMESTAMP, Utc::now().to_rfc3339())
            .body(chunk.data.clone());

        match job.checksum() {
            Some(checksum) => request.header(headers::FILE_SHA256, checksum),
            None => request,
        }
    }
}

#[async_trait]
impl ChunkTransport for HttpTransport {
    async fn send_chunk(
        &self,
        job: &UploadJob,
        chunk: &ChunkPayload,
    ) -> std::result::Result<(), TransportError> {
        trace!(
            chunk = chunk.span.index,
            bytes = chunk.span.len,
            url = %job.endpoint(),
            "Sending chunk"
        );

        let response = self
            .build_request(job, chunk)
            .send()
            .await
            .map_err(map_send_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(status_error(response).await)
    }
}

/// Map a reqwest failure that produced no response
fn map_send_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_builder() {
        TransportError::InvalidRequest(e.to_string())
    } else if e.is_connect() || e.is_request() || e.is_body() {
        TransportError::Connection(e.to_string())
    } else {
        TransportError::InvalidResponse(e.to_string())
    }
}

/// Build the error for a non-success response, keeping a short body excerpt
async fn status_error(response: Response) -> TransportError {
    let status = response.status();

    let retry_after = match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| headers::parse_retry_after(value, Utc::now())),
        _ => None,
    };

    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        body.chars().take(MAX_ERROR_BODY_CHARS).collect()
    };

    TransportError::status(status.as_u16(), message).with_retry_after(retry_after)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::upload::{ChunkSpan, FailureKind};
    use std::io::Write;
    use std::num::NonZeroU64;
    use tempfile::NamedTempFile;
    use url::Url;
    use wiremock::matchers::{body_bytes, header as header_eq, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job_for(endpoint: &str, content: &[u8]) -> (NamedTempFile, UploadJob) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        let job = UploadJob::new(
            file.path(),
            Url::parse(endpoint).unwrap(),
            NonZeroU64::new(4).unwrap(),
        )
        .unwrap();
        (file, job)
    }

    fn second_chunk() -> ChunkPayload {
        ChunkPayload::new(ChunkSpan { index: 1, offset: 4, len: 4 }, 3, b"4567".to_vec())
    }

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5), HttpMethod::Post).unwrap()
    }

    #[tokio::test]
    async fn test_chunk_request_carries_metadata() {
        let server = MockServer::start().await;
        let (_file, job) = job_for(&format!("{}/upload", server.uri()), b"0123456789");

        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header_eq("content-range", "bytes 4-7/10"))
            .and(header_eq("x-upload-id", job.id().to_string().as_str()))
            .and(header_eq("x-chunk-index", "1"))
            .and(header_eq("x-chunk-count", "3"))
            .and(header_eq("x-file-size", "10"))
            .and(header_eq("user-agent", USER_AGENT))
            .and(header_exists("x-chunk-sha256"))
            .and(header_exists("x-upload-timestamp"))
            .and(body_bytes(b"4567".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        transport().send_chunk(&job, &second_chunk()).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_method_and_file_checksum() {
        let server = MockServer::start().await;
        let (_file, job) = job_for(&format!("{}/upload", server.uri()), b"0123456789");
        let job = job.with_checksum().unwrap();

        Mock::given(method("PUT"))
            .and(header_exists("x-file-sha256"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(Duration::from_secs(5), HttpMethod::Put).unwrap();
        transport.send_chunk(&job, &second_chunk()).await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_transient_with_retry_after() {
        let server = MockServer::start().await;
        let (_file, job) = job_for(&server.uri(), b"0123456789");

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(503)
                    .insert_header("Retry-After", "7")
                    .set_body_string("maintenance"),
            )
            .mount(&server)
            .await;

        let err = transport().send_chunk(&job, &second_chunk()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transient);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(err.to_string(), "HTTP 503: maintenance");
    }

    #[tokio::test]
    async fn test_client_error_is_permanent_and_truncated() {
        let server = MockServer::start().await;
        let (_file, job) = job_for(&server.uri(), b"0123456789");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("x".repeat(500)))
            .mount(&server)
            .await;

        let err = transport().send_chunk(&job, &second_chunk()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Permanent);
        match err {
            TransportError::Status { status, message, retry_after } => {
                assert_eq!(status, 400);
                assert_eq!(message.len(), MAX_ERROR_BODY_CHARS);
                assert_eq!(retry_after, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_error_body_uses_reason_phrase() {
        let server = MockServer::start().await;
        let (_file, job) = job_for(&server.uri(), b"0123456789");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = transport().send_chunk(&job, &second_chunk()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "HTTP 429: Too Many Requests");
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        let (_file, job) = job_for(&server.uri(), b"0123456789");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(Duration::from_millis(100), HttpMethod::Post).unwrap();
        let err = transport.send_chunk(&job, &second_chunk()).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let (_file, job) = job_for("http://127.0.0.1:9/upload", b"0123456789");
        let err = transport().send_chunk(&job, &second_chunk()).await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err:?}");
    }
}
