//! # Manager Components
//!
//! Price manager, withdrawal gate, rewards manager and context manager.
//! Each is bound to its instance's access controller at construction; the
//! rest of their behavior (price feeds, withdrawal queues, reward streams,
//! call contexts) is outside this crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use tessera_protocol::{Address, Role};

use super::access::AccessController;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceManager {
    pub access_controller: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalGate {
    pub access_controller: Address,
    /// Length of the withdrawal window in seconds.
    pub window_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsManager {
    pub access_controller: Address,
    /// Set once, by the deployer, right after construction.
    pub vesting_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextManager {
    pub access_controller: Address,
    /// Approved callers known when this manager was constructed.
    pub approved_callers: BTreeSet<Address>,
}

impl ContextManager {
    /// A caller is approved if it was in the construction-time list or holds
    /// `ApprovedCaller` on the instance's controller now. The second clause
    /// covers siblings that went live after this manager did.
    pub fn is_approved(&self, caller: &Address, controller: &AccessController) -> bool {
        self.approved_callers.contains(caller) || controller.has_role(Role::ApprovedCaller, caller)
    }
}
