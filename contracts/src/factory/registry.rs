//! # Instance Registry
//!
//! One record per instance, reachable two ways:
//!
//! - by primary address (the asset container), which is how everything
//!   else refers to an instance;
//! - by sequence index, which is how instances are enumerated.
//!
//! The registry only moves forward. Indices are unique and strictly
//! increasing, and a deferred component's completion flag never goes back
//! to `false`. `put` checks all of that before touching either map, so a
//! rejected record leaves nothing behind.
//!
//! Like the ledger, the registry can journal a run of writes
//! ([`InstanceRegistry::begin`]) and undo it or report the records it
//! touched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use tessera_protocol::{
    Address, ComponentKind, FactoryResult, MasterSeed, SeedMode, StateError, ValidationError,
};

use crate::components::{AssetMetadata, FeeConfig};
use crate::journal::Journal;

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// The six addresses of an instance. For a seeded instance the two deferred
/// entries are predictions until their components are deployed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceAddresses {
    pub primary_container: Address,
    pub access_controller: Address,
    pub price_manager: Address,
    pub withdrawal_gate: Address,
    pub rewards_manager: Address,
    pub context_manager: Address,
}

impl InstanceAddresses {
    /// Collects one address per kind from `address_of`.
    pub fn from_fn(mut address_of: impl FnMut(ComponentKind) -> Address) -> Self {
        Self {
            primary_container: address_of(ComponentKind::PrimaryContainer),
            access_controller: address_of(ComponentKind::AccessController),
            price_manager: address_of(ComponentKind::PriceManager),
            withdrawal_gate: address_of(ComponentKind::WithdrawalGate),
            rewards_manager: address_of(ComponentKind::RewardsManager),
            context_manager: address_of(ComponentKind::ContextManager),
        }
    }

    pub fn get(&self, kind: ComponentKind) -> Address {
        match kind {
            ComponentKind::PrimaryContainer => self.primary_container,
            ComponentKind::AccessController => self.access_controller,
            ComponentKind::PriceManager => self.price_manager,
            ComponentKind::WithdrawalGate => self.withdrawal_gate,
            ComponentKind::RewardsManager => self.rewards_manager,
            ComponentKind::ContextManager => self.context_manager,
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    /// Phase 1 deployed; both deferred components outstanding.
    Phase1Only,
    /// Exactly one deferred component deployed.
    OneOptionalDone,
    /// Everything deployed. The orchestrator holds no standing authority.
    FullyComplete,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstanceState::Phase1Only => "phase-1-only",
            InstanceState::OneOptionalDone => "one-optional-done",
            InstanceState::FullyComplete => "fully-complete",
        })
    }
}

/// What a completion flag flip did to the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTransition {
    /// The other deferred component is still outstanding.
    Partial,
    /// This flip completed the instance.
    BecameComplete,
}

// ---------------------------------------------------------------------------
// InstanceRecord
// ---------------------------------------------------------------------------

/// Everything the factory remembers about one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Sequence index; shared across both creation modes.
    pub index: u64,
    pub seed_mode: SeedMode,
    pub master_seed: MasterSeed,
    pub metadata: AssetMetadata,
    /// The underlying asset the container manages.
    pub asset: Address,
    pub addresses: InstanceAddresses,
    /// Templates pinned for the deferred kinds at creation.
    pub rewards_manager_template: Address,
    pub context_manager_template: Address,
    pub rewards_manager_deployed: bool,
    pub context_manager_deployed: bool,
    pub owner: Address,
    pub with_admin: bool,
    /// Index of the fee package the fees were copied from.
    pub fee_package: usize,
    /// Copied at creation. Later edits to the fee table do not reach it.
    pub fees: FeeConfig,
    /// Whether the orchestrator still holds `Provisioner` on the
    /// instance's access controller.
    pub provisioner_active: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl InstanceRecord {
    pub fn primary(&self) -> Address {
        self.addresses.primary_container
    }

    pub fn is_deployed(&self, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::RewardsManager => self.rewards_manager_deployed,
            ComponentKind::ContextManager => self.context_manager_deployed,
            _ => true,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.rewards_manager_deployed && self.context_manager_deployed
    }

    pub fn state(&self) -> InstanceState {
        match (self.rewards_manager_deployed, self.context_manager_deployed) {
            (true, true) => InstanceState::FullyComplete,
            (false, false) => InstanceState::Phase1Only,
            _ => InstanceState::OneOptionalDone,
        }
    }

    /// The template pinned for a deferred `kind`.
    pub fn deferred_template(&self, kind: ComponentKind) -> Option<Address> {
        match kind {
            ComponentKind::RewardsManager => Some(self.rewards_manager_template),
            ComponentKind::ContextManager => Some(self.context_manager_template),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// InstanceRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRegistry {
    by_primary: BTreeMap<Address, InstanceRecord>,
    by_index: BTreeMap<u64, Address>,
    #[serde(skip)]
    journal: Option<Journal<Address, InstanceRecord>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a run. Writes of an earlier open run are kept.
    pub fn begin(&mut self) {
        self.journal = Some(Journal::new());
    }

    /// Undoes every write since [`begin`](Self::begin).
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (primary, prior) in journal.into_entries() {
            match prior {
                Some(record) => {
                    self.by_primary.insert(primary, record);
                }
                None => {
                    if let Some(record) = self.by_primary.remove(&primary) {
                        self.by_index.remove(&record.index);
                    }
                }
            }
        }
    }

    /// Ends the run and keeps its writes.
    pub fn commit_changes(&mut self) {
        self.journal = None;
    }

    /// Records written by the open run. Empty outside a run.
    pub fn changed(&self) -> Vec<&InstanceRecord> {
        self.journal
            .iter()
            .flat_map(|journal| journal.keys())
            .filter_map(|primary| self.by_primary.get(primary))
            .collect()
    }

    fn note(&mut self, primary: &Address) {
        if let Some(journal) = &mut self.journal {
            journal.record(primary, self.by_primary.get(primary));
        }
    }

    /// The record at `primary`, or an all-default record if none.
    pub fn get_by_primary_address(&self, primary: &Address) -> InstanceRecord {
        self.by_primary.get(primary).cloned().unwrap_or_default()
    }

    /// The primary address at `index`, or `Address::ZERO` if none.
    pub fn get_by_index(&self, index: u64) -> Address {
        self.by_index.get(&index).copied().unwrap_or(Address::ZERO)
    }

    pub fn record(&self, primary: &Address) -> Option<&InstanceRecord> {
        self.by_primary.get(primary)
    }

    /// The highest registered index, if any.
    pub fn latest_index(&self) -> Option<u64> {
        self.by_index.keys().next_back().copied()
    }

    /// Registers a new record.
    pub fn put(&mut self, record: InstanceRecord) -> Result<(), StateError> {
        let primary = record.primary();
        if self.by_index.contains_key(&record.index) {
            return Err(StateError::DuplicateIndex(record.index));
        }
        if self.by_primary.contains_key(&primary) {
            return Err(StateError::DuplicatePrimary(primary));
        }
        if let Some(latest) = self.latest_index() {
            if record.index <= latest {
                return Err(StateError::NonMonotonicIndex {
                    index: record.index,
                    latest,
                });
            }
        }

        self.note(&primary);
        self.by_index.insert(record.index, primary);
        self.by_primary.insert(primary, record);
        Ok(())
    }

    /// Sets the completion flag of deferred `kind` and reports whether this
    /// completed the instance.
    pub fn mark_optional_component_done(
        &mut self,
        primary: &Address,
        kind: ComponentKind,
    ) -> FactoryResult<CompletionTransition> {
        self.note(primary);
        let record = self
            .by_primary
            .get_mut(primary)
            .ok_or(StateError::NotRegistered(*primary))?;

        let flag = match kind {
            ComponentKind::RewardsManager => &mut record.rewards_manager_deployed,
            ComponentKind::ContextManager => &mut record.context_manager_deployed,
            other => return Err(ValidationError::InvalidComponent(other).into()),
        };
        if *flag {
            return Err(StateError::AlreadyDeployed(kind).into());
        }
        *flag = true;

        if record.is_complete() {
            record.completed_at = Some(Utc::now());
            Ok(CompletionTransition::BecameComplete)
        } else {
            Ok(CompletionTransition::Partial)
        }
    }

    /// Mutable access for the orchestrator's own bookkeeping fields.
    pub(crate) fn record_mut(&mut self, primary: &Address) -> Option<&mut InstanceRecord> {
        self.note(primary);
        self.by_primary.get_mut(primary)
    }

    pub fn len(&self) -> usize {
        self.by_primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_primary.is_empty()
    }

    /// Records in index order.
    pub fn iter(&self) -> impl Iterator<Item = &InstanceRecord> {
        self.by_index
            .values()
            .filter_map(|primary| self.by_primary.get(primary))
    }
}
