//! # Seed Derivation
//!
//! Two pure functions stand between a creation call and six addresses:
//!
//! ```text
//! (mode, disambiguator) ──derive_master_seed──▶ MasterSeed
//! (MasterSeed, kind)    ──derive_component_seed──▶ ComponentSeed  (×6)
//! ```
//!
//! In [`SeedMode::Auto`] the disambiguator is the instance's sequence
//! index. In [`SeedMode::Explicit`] it is a caller-chosen [`SeedValue`],
//! which lets two independently operated factories that share template
//! addresses land the same instance at the same addresses.
//!
//! Each mode hashes under its own BLAKE3 context, so an explicit value whose
//! bytes equal an encoded index still yields a different master seed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::component::ComponentKind;
use crate::config::{
    COMPONENT_SEED_CONTEXT, MASTER_SEED_AUTO_CONTEXT, MASTER_SEED_EXPLICIT_CONTEXT, SEED_LENGTH,
};
use crate::crypto::hash::{domain_separated_hash, domain_separated_hash_multi};
use crate::encoding::{parse_hex_array, to_prefixed_hex};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a master seed was derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedMode {
    /// From the global sequence index.
    #[default]
    Auto,
    /// From a caller-supplied value.
    Explicit,
}

impl SeedMode {
    fn context(self) -> &'static str {
        match self {
            SeedMode::Auto => MASTER_SEED_AUTO_CONTEXT,
            SeedMode::Explicit => MASTER_SEED_EXPLICIT_CONTEXT,
        }
    }
}

/// A caller-chosen explicit-mode disambiguator.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeedValue(#[serde(with = "crate::encoding::hex_bytes")] [u8; SEED_LENGTH]);

impl SeedValue {
    pub const fn from_bytes(bytes: [u8; SEED_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LENGTH] {
        &self.0
    }
}

impl From<u64> for SeedValue {
    /// Big-endian, right-aligned, the way a `uint256` holding a small
    /// number would look.
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; SEED_LENGTH];
        bytes[SEED_LENGTH - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl FromStr for SeedValue {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex_array::<SEED_LENGTH>(s).map(Self)
    }
}

impl fmt::Debug for SeedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedValue({})", to_prefixed_hex(&self.0))
    }
}

/// The root seed of one instance.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MasterSeed(#[serde(with = "crate::encoding::hex_bytes")] [u8; SEED_LENGTH]);

impl MasterSeed {
    pub fn as_bytes(&self) -> &[u8; SEED_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for MasterSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterSeed({})", to_prefixed_hex(&self.0))
    }
}

impl fmt::Display for MasterSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_prefixed_hex(&self.0))
    }
}

/// The seed of one component of one instance.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentSeed(#[serde(with = "crate::encoding::hex_bytes")] [u8; SEED_LENGTH]);

impl ComponentSeed {
    /// Wraps raw bytes. Only for callers that already hold a derived seed
    /// (storage, tests); normal code goes through [`derive_component_seed`].
    pub const fn from_bytes(bytes: [u8; SEED_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for ComponentSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentSeed({})", to_prefixed_hex(&self.0))
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derives an instance's master seed.
///
/// `disambiguator` is the encoded sequence index for [`SeedMode::Auto`] (use
/// [`auto_disambiguator`]) or the caller's [`SeedValue`] for
/// [`SeedMode::Explicit`].
pub fn derive_master_seed(mode: SeedMode, disambiguator: &SeedValue) -> MasterSeed {
    MasterSeed(domain_separated_hash(mode.context(), disambiguator.as_bytes()))
}

/// Encodes a sequence index as an auto-mode disambiguator.
pub fn auto_disambiguator(index: u64) -> SeedValue {
    SeedValue::from(index)
}

/// Shorthand for the auto-mode master seed of `index`.
pub fn auto_master_seed(index: u64) -> MasterSeed {
    derive_master_seed(SeedMode::Auto, &auto_disambiguator(index))
}

/// Shorthand for the explicit-mode master seed of `value`.
pub fn explicit_master_seed(value: &SeedValue) -> MasterSeed {
    derive_master_seed(SeedMode::Explicit, value)
}

/// Derives the seed of one component from the instance's master seed.
///
/// The master seed is fixed-width, so `master || tag` is unambiguous and
/// distinct tags can never alias.
pub fn derive_component_seed(master: &MasterSeed, kind: ComponentKind) -> ComponentSeed {
    ComponentSeed(domain_separated_hash_multi(
        COMPONENT_SEED_CONTEXT,
        &[master.as_bytes().as_slice(), kind.tag().as_bytes()],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_master_seed_is_deterministic() {
        assert_eq!(auto_master_seed(7), auto_master_seed(7));
        let value = SeedValue::from(99);
        assert_eq!(explicit_master_seed(&value), explicit_master_seed(&value));
    }

    #[test]
    fn test_modes_never_collide_on_same_bytes() {
        // Auto index 5 and explicit value 5 encode to identical bytes.
        let auto = auto_master_seed(5);
        let explicit = explicit_master_seed(&SeedValue::from(5));
        assert_ne!(auto, explicit);
    }

    #[test]
    fn test_consecutive_indices_differ() {
        assert_ne!(auto_master_seed(1), auto_master_seed(2));
    }

    #[test]
    fn test_six_distinct_component_seeds() {
        let master = auto_master_seed(1);
        let seeds: HashSet<_> = ComponentKind::ALL
            .iter()
            .map(|kind| derive_component_seed(&master, *kind))
            .collect();
        assert_eq!(seeds.len(), 6);
    }

    #[test]
    fn test_component_seed_depends_on_master() {
        let a = derive_component_seed(&auto_master_seed(1), ComponentKind::PriceManager);
        let b = derive_component_seed(&auto_master_seed(2), ComponentKind::PriceManager);
        assert_ne!(a, b);
    }

    #[test]
    fn test_seed_value_from_u64_is_right_aligned() {
        let v = SeedValue::from(0x0102);
        assert_eq!(&v.as_bytes()[30..], &[0x01u8, 0x02]);
        assert!(v.as_bytes()[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_seed_value_parses_hex() {
        let hex = format!("0x{}", "ab".repeat(32));
        let v: SeedValue = hex.parse().unwrap();
        assert_eq!(v.as_bytes(), &[0xab; 32]);
    }
}
