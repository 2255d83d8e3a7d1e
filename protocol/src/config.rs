//! # Protocol Configuration & Constants
//!
//! Every derivation context and protocol limit lives here. The context
//! strings are part of the address preimage: change one and every
//! predicted address in existence moves. Treat them as frozen.

// ---------------------------------------------------------------------------
// Derivation Contexts
// ---------------------------------------------------------------------------

/// BLAKE3 `derive_key` context for master seeds derived from the global
/// sequence index.
pub const MASTER_SEED_AUTO_CONTEXT: &str = "tessera 2026-01 master seed (auto)";

/// BLAKE3 `derive_key` context for master seeds derived from a
/// caller-supplied value. Distinct from the auto context, so an explicit
/// value that happens to equal an encoded index can never alias it.
pub const MASTER_SEED_EXPLICIT_CONTEXT: &str = "tessera 2026-01 master seed (explicit)";

/// Context for per-component seeds derived from a master seed.
pub const COMPONENT_SEED_CONTEXT: &str = "tessera 2026-01 component seed";

/// Context for deterministic deployment addresses.
pub const ADDRESS_CONTEXT: &str = "tessera 2026-01 deployment address";

// ---------------------------------------------------------------------------
// Sizes
// ---------------------------------------------------------------------------

/// Address length in bytes. Twenty, like every EVM-flavoured chain.
pub const ADDRESS_LENGTH: usize = 20;

/// Seed length in bytes. One BLAKE3 output.
pub const SEED_LENGTH: usize = 32;

/// Number of components in one instance. The topology is fixed.
pub const COMPONENTS_PER_INSTANCE: usize = 6;

// ---------------------------------------------------------------------------
// Fees & Durations
// ---------------------------------------------------------------------------

/// Basis-point denominator (100%).
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Highest fee a package may carry, in basis points. Fees above 100% are
/// not fees, they are confiscation.
pub const MAX_FEE_BPS: u16 = BPS_DENOMINATOR;

/// Default rewards vesting duration: seven days.
pub const DEFAULT_VESTING_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Default withdrawal window: one day.
pub const DEFAULT_WITHDRAWAL_WINDOW_SECS: u64 = 24 * 60 * 60;

/// The first sequence index ever handed out. Index 0 is reserved as the
/// registry's "no such instance" value.
pub const FIRST_INSTANCE_INDEX: u64 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_distinct() {
        let contexts = [
            MASTER_SEED_AUTO_CONTEXT,
            MASTER_SEED_EXPLICIT_CONTEXT,
            COMPONENT_SEED_CONTEXT,
            ADDRESS_CONTEXT,
        ];
        for (i, a) in contexts.iter().enumerate() {
            for b in contexts.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_defaults_sanity() {
        assert!(DEFAULT_VESTING_DURATION_SECS > 0);
        assert!(DEFAULT_WITHDRAWAL_WINDOW_SECS > 0);
        assert_eq!(MAX_FEE_BPS, 10_000);
        assert!(FIRST_INSTANCE_INDEX > 0);
    }
}
