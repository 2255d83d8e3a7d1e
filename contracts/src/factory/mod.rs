//! # Factory
//!
//! The deterministic provisioning orchestrator and its parts:
//!
//! - **config** — global configuration, template set, fee packages.
//! - **registry** — instance records by primary address and by index.
//! - **assembler** — the access-controller payload of a new instance.
//! - **bootstrap** — scoped elevation windows and the one-shot release of
//!   the standing provisioner role.
//! - **orchestrator** — the public entry points.
//! - **store** — sled persistence.

pub mod assembler;
pub mod bootstrap;
pub mod config;
pub mod orchestrator;
pub mod registry;
pub mod store;

pub use assembler::{build_access_payload, KnownComponents};
pub use bootstrap::{release_standing_capability, with_window, BootstrapWindow};
pub use config::{FeePackage, GlobalConfiguration, TemplateSet};
pub use orchestrator::{CreateRequest, Orchestrator};
pub use registry::{
    CompletionTransition, InstanceAddresses, InstanceRecord, InstanceRegistry, InstanceState,
};
pub use store::{FactoryDb, FactorySnapshot, StoreError};
