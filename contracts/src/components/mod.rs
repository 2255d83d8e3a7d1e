//! # Components
//!
//! The six component kinds of an instance. Each kind has exactly one
//! implementation (the Rust type below) and any number of deployed
//! instances, each with its own isolated [`ComponentState`] in the
//! [`Ledger`](crate::ledger::Ledger).
//!
//! A freshly deployed component has no state at all. It gets one when its
//! deployer calls the initialization entry point with the matching
//! [`ComponentInit`].

pub mod access;
pub mod container;
pub mod managers;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use tessera_protocol::{Address, ComponentKind};

pub use access::{AccessController, AccessEvent, AccessPayload};
pub use container::{AssetContainer, AssetContainerInit, AssetMetadata, FeeConfig};
pub use managers::{ContextManager, PriceManager, RewardsManager, WithdrawalGate};

/// Initialization arguments, one variant per component kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentInit {
    PrimaryContainer(AssetContainerInit),
    AccessController(AccessPayload),
    PriceManager {
        access_controller: Address,
    },
    WithdrawalGate {
        access_controller: Address,
        window_secs: u64,
    },
    RewardsManager {
        access_controller: Address,
    },
    ContextManager {
        access_controller: Address,
        approved_callers: Vec<Address>,
    },
}

impl ComponentInit {
    /// The component kind these arguments construct.
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentInit::PrimaryContainer(_) => ComponentKind::PrimaryContainer,
            ComponentInit::AccessController(_) => ComponentKind::AccessController,
            ComponentInit::PriceManager { .. } => ComponentKind::PriceManager,
            ComponentInit::WithdrawalGate { .. } => ComponentKind::WithdrawalGate,
            ComponentInit::RewardsManager { .. } => ComponentKind::RewardsManager,
            ComponentInit::ContextManager { .. } => ComponentKind::ContextManager,
        }
    }

    /// Runs the constructor. `deployer` is recorded as the sender of any
    /// grants the construction performs.
    pub fn construct(self, deployer: Address) -> ComponentState {
        match self {
            ComponentInit::PrimaryContainer(init) => ComponentState::PrimaryContainer(init.into()),
            ComponentInit::AccessController(payload) => {
                ComponentState::AccessController(AccessController::from_payload(&payload, deployer))
            }
            ComponentInit::PriceManager { access_controller } => {
                ComponentState::PriceManager(PriceManager { access_controller })
            }
            ComponentInit::WithdrawalGate {
                access_controller,
                window_secs,
            } => ComponentState::WithdrawalGate(WithdrawalGate {
                access_controller,
                window_secs,
            }),
            ComponentInit::RewardsManager { access_controller } => {
                ComponentState::RewardsManager(RewardsManager {
                    access_controller,
                    vesting_secs: None,
                })
            }
            ComponentInit::ContextManager {
                access_controller,
                approved_callers,
            } => ComponentState::ContextManager(ContextManager {
                access_controller,
                approved_callers: approved_callers.into_iter().collect::<BTreeSet<_>>(),
            }),
        }
    }
}

/// The isolated storage of one deployed component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentState {
    PrimaryContainer(AssetContainer),
    AccessController(AccessController),
    PriceManager(PriceManager),
    WithdrawalGate(WithdrawalGate),
    RewardsManager(RewardsManager),
    ContextManager(ContextManager),
}

impl ComponentState {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentState::PrimaryContainer(_) => ComponentKind::PrimaryContainer,
            ComponentState::AccessController(_) => ComponentKind::AccessController,
            ComponentState::PriceManager(_) => ComponentKind::PriceManager,
            ComponentState::WithdrawalGate(_) => ComponentKind::WithdrawalGate,
            ComponentState::RewardsManager(_) => ComponentKind::RewardsManager,
            ComponentState::ContextManager(_) => ComponentKind::ContextManager,
        }
    }

    /// The access controller this component answers to. The controller
    /// answers to itself and returns `None`.
    pub fn access_controller(&self) -> Option<Address> {
        match self {
            ComponentState::PrimaryContainer(c) => Some(c.access_controller),
            ComponentState::AccessController(_) => None,
            ComponentState::PriceManager(c) => Some(c.access_controller),
            ComponentState::WithdrawalGate(c) => Some(c.access_controller),
            ComponentState::RewardsManager(c) => Some(c.access_controller),
            ComponentState::ContextManager(c) => Some(c.access_controller),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_matches_declared_kind() {
        let ac = Address::labelled("ac");
        let inits = vec![
            ComponentInit::AccessController(AccessPayload::default()),
            ComponentInit::PriceManager { access_controller: ac },
            ComponentInit::WithdrawalGate {
                access_controller: ac,
                window_secs: 60,
            },
            ComponentInit::RewardsManager { access_controller: ac },
            ComponentInit::ContextManager {
                access_controller: ac,
                approved_callers: vec![],
            },
        ];
        for init in inits {
            let kind = init.kind();
            let state = init.construct(Address::labelled("deployer"));
            assert_eq!(state.kind(), kind);
        }
    }

    #[test]
    fn rewards_manager_starts_without_vesting() {
        let state = ComponentInit::RewardsManager {
            access_controller: Address::labelled("ac"),
        }
        .construct(Address::labelled("deployer"));
        match state {
            ComponentState::RewardsManager(rm) => assert_eq!(rm.vesting_secs, None),
            other => panic!("unexpected state {other:?}"),
        }
    }
}
