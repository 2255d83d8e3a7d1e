//! # Hashing Primitives for Tessera
//!
//! Every seed and every predicted address flows through here. There is one
//! hash function (BLAKE3) and one way to separate domains (its
//! `derive_key` mode). Anything else would be a second way to get it wrong.

pub mod hash;

pub use hash::{domain_separated_hash, domain_separated_hash_multi};
