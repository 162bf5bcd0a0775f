//! SHA-256 helpers for whole files and chunk buffers

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Read buffer used when hashing streams
const HASH_BUFFER_SIZE: usize = 8192;

/// Hex-encoded SHA-256 of an in-memory buffer
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex-encoded SHA-256 of everything readable from `reader`
pub fn sha256_reader<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hex-encoded SHA-256 of a file. The file is opened read-only.
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    sha256_reader(&mut file)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_sha256_bytes() {
        assert_eq!(sha256_bytes(b"hello world"), HELLO_WORLD_SHA256);
    }

    #[test]
    fn test_sha256_bytes_empty() {
        assert_eq!(
            sha256_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_reader_matches_bytes() {
        // Larger than one read buffer so the loop runs more than once
        let data = vec![7u8; HASH_BUFFER_SIZE * 3 + 11];
        let mut cursor = Cursor::new(data.clone());
        assert_eq!(sha256_reader(&mut cursor).unwrap(), sha256_bytes(&data));
    }

    #[test]
    fn test_sha256_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"hello world").unwrap();
        temp_file.flush().unwrap();

        assert_eq!(sha256_file(temp_file.path()).unwrap(), HELLO_WORLD_SHA256);
    }

    #[test]
    fn test_sha256_file_missing() {
        let result = sha256_file("/definitely/not/here.log");
        assert!(matches!(result, Err(crate::LogupError::Io(_))));
    }
}
