// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tessera Protocol — Core Primitives
//!
//! Tessera provisions *instances*: bundles of six cooperating components
//! (an asset container, its access controller, a price manager, a
//! withdrawal gate, a rewards manager and a context manager) whose
//! addresses are known before any of them exist.
//!
//! This crate holds everything that is pure and shared. Nothing in here
//! knows what a component *does*; it only knows how components are named,
//! where they will land, and how things go wrong.
//!
//! ## Architecture
//!
//! - **address** — 20-byte identities with a hex text form.
//! - **crypto** — BLAKE3 hashing with proper domain separation.
//! - **component** — the six component kinds and their seed tags.
//! - **seed** — master-seed and component-seed derivation.
//! - **address_space** — predict-then-deploy address bookkeeping.
//! - **sequence** — the global instance counter, behind a trait.
//! - **access** — the role and operation vocabulary shared by every
//!   access controller.
//! - **error** — the four-way error taxonomy used across the workspace.
//! - **config** — derivation contexts and protocol limits.
//!
//! ## Design Philosophy
//!
//! 1. Derivation is a pure function. Same inputs, same address, on every
//!    machine, forever.
//! 2. Domain tags are constants, not conventions.
//! 3. Errors say which of the four things went wrong, never "something".

pub mod access;
pub mod address;
pub mod address_space;
pub mod component;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod seed;
pub mod sequence;

pub use access::{Operation, Role};
pub use address::Address;
pub use address_space::{predict_address, AddressSpace};
pub use component::ComponentKind;
pub use error::{
    AuthorizationError, ConfigurationError, FactoryError, FactoryResult, StateError,
    ValidationError,
};
pub use seed::{derive_component_seed, derive_master_seed, ComponentSeed, MasterSeed, SeedMode, SeedValue};
pub use sequence::{AtomicSequence, SequenceGenerator, SequenceReservation};
