//! # Access Vocabulary
//!
//! Every access controller speaks the same small language: a fixed set of
//! [`Role`]s and a fixed set of guarded [`Operation`]s. Each operation has a
//! *requirement* (the role a caller must hold). Requirements have defaults
//! and can be reassigned at runtime, which is exactly what the
//! orchestrator's bootstrap window does for the duration of one call.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A role in an instance's access controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// The instance owner. Administers every other role by default.
    Owner,
    /// Operational administrators copied from the factory's admin list.
    Admin,
    /// The DAO-style fee recipient.
    Dao,
    /// Components allowed to call one another.
    ApprovedCaller,
    /// The orchestrator's standing capability over a partially complete
    /// instance. Released once the instance is fully complete.
    Provisioner,
    /// Single-purpose temporary capability held only inside a bootstrap
    /// window.
    Bootstrap,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Owner,
        Role::Admin,
        Role::Dao,
        Role::ApprovedCaller,
        Role::Provisioner,
        Role::Bootstrap,
    ];

    /// The role that administers grants and revocations of `self` when no
    /// override is in place.
    pub const fn default_admin(self) -> Role {
        match self {
            Role::Bootstrap => Role::Provisioner,
            _ => Role::Owner,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Dao => "dao",
            Role::ApprovedCaller => "approved-caller",
            Role::Provisioner => "provisioner",
            Role::Bootstrap => "bootstrap",
        };
        f.write_str(name)
    }
}

/// A guarded operation on an instance's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Wire the rewards manager into the asset container.
    SetRewardsManager,
    /// Change the asset container's fee configuration.
    UpdateFees,
    /// Grant or revoke the given role.
    ManageRole(Role),
}

impl Operation {
    /// The requirement an operation carries until someone reassigns it.
    pub const fn default_requirement(self) -> Role {
        match self {
            Operation::SetRewardsManager => Role::Owner,
            Operation::UpdateFees => Role::Admin,
            Operation::ManageRole(role) => role.default_admin(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::SetRewardsManager => f.write_str("set-rewards-manager"),
            Operation::UpdateFees => f.write_str("update-fees"),
            Operation::ManageRole(role) => write!(f, "manage-role({role})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_is_administered_by_provisioner() {
        assert_eq!(Role::Bootstrap.default_admin(), Role::Provisioner);
        assert_eq!(
            Operation::ManageRole(Role::Bootstrap).default_requirement(),
            Role::Provisioner
        );
    }

    #[test]
    fn test_owner_administers_everything_else() {
        for role in Role::ALL {
            if role != Role::Bootstrap {
                assert_eq!(role.default_admin(), Role::Owner);
            }
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(
            Operation::ManageRole(Role::ApprovedCaller).to_string(),
            "manage-role(approved-caller)"
        );
        assert_eq!(Operation::SetRewardsManager.to_string(), "set-rewards-manager");
    }
}
