//! # Error Taxonomy
//!
//! Four things can go wrong when provisioning an instance, and every error
//! in the workspace says which:
//!
//! | Kind            | Meaning                                                  |
//! |-----------------|----------------------------------------------------------|
//! | Configuration   | A template or global address the call needs is unset.    |
//! | Validation      | An argument or config value is out of range or zero.     |
//! | State           | The world is not in the state the call requires.         |
//! | Authorization   | Someone (possibly the orchestrator) lacks a required role.|
//!
//! A fifth, `Storage`, surfaces failures of the durable store, which is not
//! part of the provisioning logic but can still abort a commit.
//!
//! All errors are fail-fast. Nothing is retried internally and nothing is
//! downgraded to a warning.

use thiserror::Error;

use crate::access::{Operation, Role};
use crate::address::Address;
use crate::component::ComponentKind;

/// Result alias used across the workspace.
pub type FactoryResult<T> = Result<T, FactoryError>;

/// Top-level error for every provisioning operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("storage error: {0}")]
    Storage(String),
}

/// A template or global address is missing or unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The template reference passed to a deployment is empty.
    #[error("invalid template: template address is zero")]
    InvalidTemplate,

    /// No template is configured for a component kind the call needs.
    #[error("no template configured for {0}")]
    MissingTemplate(ComponentKind),

    /// The template address does not host a published implementation.
    #[error("no implementation published at template {0}")]
    UnknownTemplate(Address),

    /// The template exists but implements a different component kind.
    #[error("template {template} implements {actual}, expected {expected}")]
    TemplateKindMismatch {
        template: Address,
        expected: ComponentKind,
        actual: ComponentKind,
    },
}

/// An argument or configuration value failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The fee-package index is past the end of the table.
    #[error("fee package {index} out of range (table has {len})")]
    FeePackageOutOfRange { index: usize, len: usize },

    /// The fee-package table is empty.
    #[error("fee package table is empty")]
    EmptyFeeTable,

    /// A required address is zero.
    #[error("{0} must not be the zero address")]
    ZeroAddress(&'static str),

    /// A fee exceeds the protocol maximum.
    #[error("{field} of {bps} bps exceeds maximum of {max} bps")]
    FeeTooHigh {
        field: &'static str,
        bps: u16,
        max: u16,
    },

    /// A required duration is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// A required metadata field is empty.
    #[error("{0} must not be empty")]
    EmptyMetadata(&'static str),

    /// The component kind cannot be used here (e.g. deferring a Phase-1 kind).
    #[error("{0} is not a deferred component")]
    InvalidComponent(ComponentKind),
}

/// The world is not in the state the call requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The seed was already used for a deployment by this deployer.
    #[error("seed already used")]
    SeedAlreadyUsed,

    /// The deferred component was already deployed for this instance.
    #[error("{0} already deployed for this instance")]
    AlreadyDeployed(ComponentKind),

    /// No instance is registered under this primary address.
    #[error("no instance registered at {0}")]
    NotRegistered(Address),

    /// Something already lives at the target address.
    #[error("address {0} is already occupied")]
    AddressOccupied(Address),

    /// Nothing is deployed at this address.
    #[error("nothing deployed at {0}")]
    NotDeployed(Address),

    /// The component at this address is not the expected kind.
    #[error("{address} is a {actual}, expected {expected}")]
    WrongComponentKind {
        address: Address,
        expected: ComponentKind,
        actual: ComponentKind,
    },

    /// The component was already initialized.
    #[error("{0} is already initialized")]
    AlreadyInitialized(Address),

    /// The component has not been initialized yet.
    #[error("{0} is not initialized")]
    NotInitialized(Address),

    /// A one-time wiring call was already made.
    #[error("{0} is already wired")]
    AlreadyWired(Address),

    /// The sequence index is already registered.
    #[error("instance index {0} already registered")]
    DuplicateIndex(u64),

    /// The primary address is already registered.
    #[error("instance at {0} already registered")]
    DuplicatePrimary(Address),

    /// The index does not follow the highest registered index.
    #[error("instance index {index} does not follow {latest}")]
    NonMonotonicIndex { index: u64, latest: u64 },
}

/// Someone lacks the authority a guarded step requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// The account does not hold the role the operation requires.
    #[error("{account} lacks {role} required for {operation}")]
    MissingRole {
        account: Address,
        role: Role,
        operation: Operation,
    },

    /// Initialization entry points are reserved for the deployer.
    #[error("{caller} is not the deployer of {component}")]
    NotDeployer { caller: Address, component: Address },

    /// Factory administration is reserved for the factory owner.
    #[error("{0} is not the factory owner")]
    NotFactoryOwner(Address),

    /// Renouncing a role you do not hold.
    #[error("{account} does not hold {role}")]
    NotRoleHolder { account: Address, role: Role },

    /// Reassigning a requirement needs `Provisioner` or `Owner`.
    #[error("{0} may not reassign operation requirements")]
    RequirementChangeDenied(Address),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions_pick_the_right_kind() {
        let e: FactoryError = StateError::SeedAlreadyUsed.into();
        assert!(matches!(e, FactoryError::State(StateError::SeedAlreadyUsed)));

        let e: FactoryError = ValidationError::EmptyFeeTable.into();
        assert!(matches!(e, FactoryError::Validation(_)));
    }

    #[test]
    fn test_out_of_range_message_carries_index_and_len() {
        let e = FactoryError::from(ValidationError::FeePackageOutOfRange { index: 4, len: 2 });
        let msg = e.to_string();
        assert!(msg.contains('4'));
        assert!(msg.contains('2'));
    }
}
