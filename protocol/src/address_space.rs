//! # Deterministic Address Space
//!
//! Where will a component land before it exists? Here:
//!
//! ```text
//! address = last20( BLAKE3_derive_key(ADDRESS_CONTEXT, deployer || seed || template) )
//! ```
//!
//! All three inputs are fixed-width, so the preimage is unambiguous. The
//! template address is part of it for the same reason a clone's code
//! reference is part of its creation hash: a different implementation is a
//! different contract and must not squat on the same address.
//!
//! [`AddressSpace`] is the bookkeeping side: it remembers which
//! `(deployer, seed)` pairs were consumed and which addresses are occupied,
//! and it refuses to deploy anything twice.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::address::Address;
use crate::config::ADDRESS_CONTEXT;
use crate::crypto::hash::domain_separated_hash_multi;
use crate::error::{ConfigurationError, FactoryResult, StateError};
use crate::seed::ComponentSeed;

/// Predicts the address `deployer` would obtain by deploying `template`
/// under `seed`. Pure; valid before and after the deployment happens.
pub fn predict_address(deployer: Address, seed: &ComponentSeed, template: Address) -> Address {
    Address::from_digest(&domain_separated_hash_multi(
        ADDRESS_CONTEXT,
        &[
            deployer.as_bytes().as_slice(),
            seed.as_bytes().as_slice(),
            template.as_bytes().as_slice(),
        ],
    ))
}

/// Tracks consumed seeds and occupied addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSpace {
    /// `(deployer, seed)` pairs that have produced a deployment.
    used_seeds: BTreeSet<(Address, ComponentSeed)>,
    /// Every address that holds something, deterministic or not.
    occupied: BTreeSet<Address>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a space from persisted parts.
    pub fn restore(
        used_seeds: impl IntoIterator<Item = (Address, ComponentSeed)>,
        occupied: impl IntoIterator<Item = Address>,
    ) -> Self {
        Self {
            used_seeds: used_seeds.into_iter().collect(),
            occupied: occupied.into_iter().collect(),
        }
    }

    /// Same as [`predict_address`]; here for call sites that hold a space.
    pub fn predict(&self, deployer: Address, seed: &ComponentSeed, template: Address) -> Address {
        predict_address(deployer, seed, template)
    }

    /// Performs a deterministic deployment and returns its address, which is
    /// always equal to [`predict`](Self::predict) for the same inputs.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::InvalidTemplate`] if `template` is zero.
    /// - [`StateError::SeedAlreadyUsed`] if `deployer` already deployed
    ///   under `seed`. The earlier deployment is left untouched.
    /// - [`StateError::AddressOccupied`] if the predicted address is taken.
    pub fn deploy(
        &mut self,
        deployer: Address,
        seed: &ComponentSeed,
        template: Address,
    ) -> FactoryResult<Address> {
        if template.is_zero() {
            return Err(ConfigurationError::InvalidTemplate.into());
        }
        if self.used_seeds.contains(&(deployer, *seed)) {
            return Err(StateError::SeedAlreadyUsed.into());
        }

        let address = predict_address(deployer, seed, template);
        if self.occupied.contains(&address) {
            return Err(StateError::AddressOccupied(address).into());
        }

        self.used_seeds.insert((deployer, *seed));
        self.occupied.insert(address);
        tracing::debug!(%deployer, %template, %address, "deterministic deployment");
        Ok(address)
    }

    /// Claims a fixed, non-derived address (e.g. where a template
    /// implementation is published).
    pub fn occupy(&mut self, address: Address) -> FactoryResult<()> {
        if !self.occupied.insert(address) {
            return Err(StateError::AddressOccupied(address).into());
        }
        Ok(())
    }

    /// Forgets that `deployer` consumed `seed`. Only for undoing a
    /// deployment that never became visible.
    pub fn release_seed(&mut self, deployer: Address, seed: &ComponentSeed) {
        self.used_seeds.remove(&(deployer, *seed));
    }

    /// Frees `address`. Only for undoing a claim that never became visible.
    pub fn vacate(&mut self, address: &Address) {
        self.occupied.remove(address);
    }

    /// Every consumed `(deployer, seed)` pair.
    pub fn used_seeds(&self) -> impl Iterator<Item = &(Address, ComponentSeed)> {
        self.used_seeds.iter()
    }

    /// Returns `true` if `deployer` already consumed `seed`.
    pub fn is_seed_used(&self, deployer: Address, seed: &ComponentSeed) -> bool {
        self.used_seeds.contains(&(deployer, *seed))
    }

    /// Returns `true` if anything lives at `address`.
    pub fn is_occupied(&self, address: &Address) -> bool {
        self.occupied.contains(address)
    }

    /// Number of occupied addresses.
    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }
}
