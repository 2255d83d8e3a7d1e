//! # Fixed-Width Byte Encoding
//!
//! Addresses and seeds are fixed-width byte arrays. Humans read them as
//! `0x`-prefixed hex; storage wants raw bytes. The serde helper below picks
//! the right form based on `is_human_readable()`, so the same types work in
//! JSON config files and in bincode on disk.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

/// Parse a `0x`-prefixed (or bare) hex string into an `N`-byte array.
pub fn parse_hex_array<const N: usize>(s: &str) -> Result<[u8; N], hex::FromHexError> {
    let trimmed = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let mut out = [0u8; N];
    hex::decode_to_slice(trimmed, &mut out)?;
    Ok(out)
}

/// Render bytes as lowercase `0x`-prefixed hex.
pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// `#[serde(with = "crate::encoding::hex_bytes")]` for `[u8; N]` fields.
pub mod hex_bytes {
    use super::*;

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&to_prefixed_hex(bytes))
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            parse_hex_array::<N>(&text).map_err(D::Error::custom)
        } else {
            let raw = Vec::<u8>::deserialize(deserializer)?;
            let len = raw.len();
            raw.try_into()
                .map_err(|_| D::Error::custom(format!("expected {N} bytes, got {len}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_prefix_and_bare() {
        let a: [u8; 2] = parse_hex_array("0xbeef").unwrap();
        let b: [u8; 2] = parse_hex_array("beef").unwrap();
        assert_eq!(a, [0xbe, 0xef]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(parse_hex_array::<4>("0xbeef").is_err());
        assert!(parse_hex_array::<1>("0xbeef").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_hex_array::<2>("0xzzzz").is_err());
    }

    #[test]
    fn test_to_prefixed_hex() {
        assert_eq!(to_prefixed_hex(&[0x00, 0xff]), "0x00ff");
    }
}
