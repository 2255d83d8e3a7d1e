//! # Tessera Contracts
//!
//! The "on-chain" half of Tessera: the components an instance is made of,
//! the ledger that hosts them, and the factory that provisions them.
//!
//! - **components** — the six component kinds. Only their initialization
//!   and wiring surfaces are modelled; their business logic (asset
//!   accounting, pricing, withdrawals, rewards) lives elsewhere.
//! - **ledger** — the shared world: published implementations, deployed
//!   component instances, and the deterministic address space.
//! - **journal** — undo records that let a call roll back in place.
//! - **factory** — the provisioning orchestrator: registry, access
//!   bootstrap, configuration assembly, the two-phase creation protocol,
//!   and its durable store.
//!
//! ## Design Principles
//!
//! 1. One implementation per component kind, many isolated states. A
//!    deployed component is an address, a pointer to its implementation,
//!    and its own storage.
//! 2. Every privileged call names its caller and is checked against the
//!    instance's access controller. No ambient authority.
//! 3. Every public call is all-or-nothing. The factory journals what a
//!    call writes and undoes it if any step fails.
//! 4. Every public type is serializable (serde) for persistence.

pub mod components;
pub mod factory;
pub mod journal;
pub mod ledger;

pub use factory::{
    CreateRequest, FactoryDb, FeePackage, GlobalConfiguration, InstanceAddresses, InstanceRecord,
    InstanceRegistry, InstanceState, Orchestrator, TemplateSet,
};
pub use ledger::Ledger;
