//! Chunk request header names and response header parsing

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Upload id shared by every chunk of one file
pub const UPLOAD_ID: &str = "X-Upload-Id";

/// File name without directories
pub const FILE_NAME: &str = "X-File-Name";

/// Total file size in bytes
pub const FILE_SIZE: &str = "X-File-Size";

/// Hex SHA-256 of the whole file, only sent when checksums are enabled
pub const FILE_SHA256: &str = "X-File-Sha256";

/// Zero-based chunk index
pub const CHUNK_INDEX: &str = "X-Chunk-Index";

/// Number of chunks in the file
pub const CHUNK_COUNT: &str = "X-Chunk-Count";

/// Hex SHA-256 of the chunk body
pub const CHUNK_SHA256: &str = "X-Chunk-Sha256";

/// RFC 3339 time the request was built
pub const UPLOAD_TIMESTAMP: &str = "X-Upload-Timestamp";

/// Parse a `Retry-After` value relative to `now`.
///
/// Accepts delta-seconds (`"120"`) or an HTTP date
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`). Dates in the past yield zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap()
    }

    #[test]
    fn test_retry_after_seconds() {
        assert_eq!(parse_retry_after("120", now()), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 0 ", now()), Some(Duration::ZERO));
    }

    #[test]
    fn test_retry_after_http_date() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now()),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now()),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_retry_after_garbage() {
        assert_eq!(parse_retry_after("", now()), None);
        assert_eq!(parse_retry_after("soon", now()), None);
        assert_eq!(parse_retry_after("-5", now()), None);
    }
}
