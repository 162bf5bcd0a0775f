//! Small shared value types

use crate::error::{LogupError, Result};
use byte_unit::{Byte, UnitType};

/// Parse a human-readable byte size such as `"1MiB"`, `"512 KiB"` or `"1048576"`.
///
/// Unit suffixes are case-insensitive. Zero is rejected because every caller
/// uses the value as a divisor or buffer length.
pub fn parse_byte_size(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LogupError::invalid_size(input, "empty value"));
    }

    let bytes = Byte::parse_str(trimmed, true)
        .map_err(|e| LogupError::invalid_size(input, e.to_string()))?
        .as_u64();

    if bytes == 0 {
        return Err(LogupError::invalid_size(input, "size must be greater than zero"));
    }

    Ok(bytes)
}

/// Format a byte count with the largest binary unit that keeps it >= 1,
/// e.g. `"512 B"` or `"1.50 KiB"`
pub fn format_byte_size(bytes: u64) -> String {
    format!("{:.2}", Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_bytes() {
        assert_eq!(parse_byte_size("1024").unwrap(), 1024);
        assert_eq!(parse_byte_size("  7 ").unwrap(), 7);
    }

    #[test]
    fn test_parse_binary_units() {
        assert_eq!(parse_byte_size("4MiB").unwrap(), 4 * 1024 * 1024);
        assert_eq!(parse_byte_size("512 KiB").unwrap(), 512 * 1024);
        assert_eq!(parse_byte_size("1mib").unwrap(), 1024 * 1024);
    }

    #[test]
    fn test_parse_rejects_zero_and_garbage() {
        assert!(parse_byte_size("0").is_err());
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("lots").is_err());
        assert!(matches!(
            parse_byte_size("-5"),
            Err(LogupError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_format_byte_size() {
        assert_eq!(format_byte_size(0), "0 B");
        assert_eq!(format_byte_size(512), "512 B");
        assert_eq!(format_byte_size(1536), "1.50 KiB");
        assert_eq!(format_byte_size(5 * 1024 * 1024), "5.00 MiB");
        assert_eq!(format_byte_size(1073741824), "1.00 GiB");
    }
}
