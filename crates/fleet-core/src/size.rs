//! Byte-size parsing for memory settings (`512MiB`, `8G`, `1073741824`).

use serde::{Deserialize, Deserializer};

const KIB: u64 = 1024;

/// Parse a byte-size string. Suffixes are binary multiples and
/// case-insensitive; a bare number is bytes.
pub fn parse_bytes(s: &str) -> Option<u64> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => KIB,
        "m" | "mb" | "mib" => KIB.pow(2),
        "g" | "gb" | "gib" => KIB.pow(3),
        "t" | "tb" | "tib" => KIB.pow(4),
        _ => return None,
    };

    let bytes = (value * multiplier as f64).round();
    if bytes >= u64::MAX as f64 {
        return None;
    }
    Some(bytes as u64)
}

/// Serde helper accepting either an integer byte count or a size string.
pub fn deserialize_bytes<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bytes(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bytes(b) => Ok(b),
        Raw::Text(s) => parse_bytes(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid byte size: {s:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_bytes() {
        assert_eq!(parse_bytes("1024"), Some(1024));
        assert_eq!(parse_bytes("0"), Some(0));
    }

    #[test]
    fn parses_binary_suffixes() {
        assert_eq!(parse_bytes("512MiB"), Some(512 * 1024 * 1024));
        assert_eq!(parse_bytes("8G"), Some(8 * 1024 * 1024 * 1024));
        assert_eq!(parse_bytes("2kb"), Some(2048));
        assert_eq!(parse_bytes("1 TiB"), Some(1024u64.pow(4)));
    }

    #[test]
    fn parses_fractions() {
        assert_eq!(parse_bytes("1.5GiB"), Some(1536 * 1024 * 1024));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_bytes(""), None);
        assert_eq!(parse_bytes("lots"), None);
        assert_eq!(parse_bytes("12parsecs"), None);
    }

    #[test]
    fn rejects_sizes_beyond_u64() {
        assert_eq!(parse_bytes("99999999999TiB"), None);
        assert_eq!(parse_bytes("18446744073709551616"), None);
        assert_eq!(parse_bytes("16383TiB"), Some(16383 * 1024u64.pow(4)));
    }
}
