//! # Addresses
//!
//! A 20-byte identity. Deployed components, deployers, owners, fee
//! recipients and template implementations are all just addresses.
//!
//! [`Address::ZERO`] doubles as "unset": registry lookups return it on a
//! miss, and every validation path rejects it where a real identity is
//! required.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ADDRESS_LENGTH;
use crate::crypto::hash::domain_separated_hash;
use crate::encoding::{parse_hex_array, to_prefixed_hex};

/// A 20-byte account or component address.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(#[serde(with = "crate::encoding::hex_bytes")] [u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero address. Never a valid identity.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wraps raw bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Takes the trailing 20 bytes of a 32-byte digest, the usual way a
    /// hash becomes an address.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[32 - ADDRESS_LENGTH..]);
        Self(bytes)
    }

    /// Derives a stable test/label address from a human-readable name.
    ///
    /// Handy for fixtures and config files (`Address::labelled("owner")`);
    /// the label is hashed, so labelled addresses are as collision-free as
    /// any other.
    pub fn labelled(label: &str) -> Self {
        Self::from_digest(&domain_separated_hash("tessera address label", label.as_bytes()))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Returns `true` for [`Address::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Lowercase `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex_array::<ADDRESS_LENGTH>(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_default() {
        assert_eq!(Address::default(), Address::ZERO);
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn test_labelled_is_stable_and_nonzero() {
        let a = Address::labelled("owner");
        assert_eq!(a, Address::labelled("owner"));
        assert_ne!(a, Address::labelled("recipient"));
        assert!(!a.is_zero());
    }

    #[test]
    fn test_hex_round_trip() {
        let a = Address::labelled("token");
        let parsed: Address = a.to_hex().parse().unwrap();
        assert_eq!(parsed, a);
    }

    #[test]
    fn test_from_str_rejects_short_input() {
        assert!("0x1234".parse::<Address>().is_err());
    }

    #[test]
    fn test_json_uses_hex_string() {
        let a = Address::labelled("json");
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", a.to_hex()));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_bincode_uses_raw_bytes() {
        let a = Address::labelled("bincode");
        let bytes = bincode::serialize(&a).unwrap();
        // 8-byte length prefix + 20 raw bytes.
        assert_eq!(bytes.len(), 8 + ADDRESS_LENGTH);
        let back: Address = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, a);
    }
}
