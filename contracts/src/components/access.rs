//! # Access Controller
//!
//! The role engine every component of an instance defers to. It holds role
//! memberships, a requirement per guarded [`Operation`], and a plain
//! history of what changed.
//!
//! ## Rules
//!
//! - `grant_role` / `revoke_role` for role `R` require the sender to hold
//!   the current requirement of `Operation::ManageRole(R)` (by default
//!   `Owner`, or `Provisioner` for `Bootstrap`).
//! - `renounce_role` needs no authority beyond holding the role.
//! - `set_requirement` requires `Provisioner` or `Owner`. It is how a
//!   bootstrap window narrows an operation onto `Bootstrap` for one call.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use tessera_protocol::{Address, AuthorizationError, Operation, Role};

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Initialization payload for an access controller.
///
/// Built by the factory's configuration assembler; applied once, by the
/// deployer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPayload {
    /// When `true`, every account counts as an approved caller.
    pub is_public: bool,
    pub owners: Vec<Address>,
    pub admins: Vec<Address>,
    /// DAO-style fee recipients.
    pub dao: Vec<Address>,
    pub approved_callers: Vec<Address>,
    pub provisioners: Vec<Address>,
}

impl AccessPayload {
    /// Flattens the payload into `(role, account)` grants, in a stable order.
    pub fn grants(&self) -> Vec<(Role, Address)> {
        let groups: [(Role, &Vec<Address>); 5] = [
            (Role::Owner, &self.owners),
            (Role::Admin, &self.admins),
            (Role::Dao, &self.dao),
            (Role::ApprovedCaller, &self.approved_callers),
            (Role::Provisioner, &self.provisioners),
        ];
        groups
            .into_iter()
            .flat_map(|(role, accounts)| accounts.iter().map(move |a| (role, *a)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One entry in an access controller's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessEvent {
    RoleGranted {
        role: Role,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
        sender: Address,
    },
    RequirementChanged {
        operation: Operation,
        previous: Role,
        new: Role,
        sender: Address,
    },
}

// ---------------------------------------------------------------------------
// AccessController
// ---------------------------------------------------------------------------

/// Per-instance role engine state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessController {
    is_public: bool,
    members: BTreeMap<Role, BTreeSet<Address>>,
    /// Overrides of [`Operation::default_requirement`].
    requirements: BTreeMap<Operation, Role>,
    history: Vec<AccessEvent>,
}

impl AccessController {
    /// Builds a controller from its payload. `sender` is the deployer that
    /// applied it and shows up in the history.
    pub fn from_payload(payload: &AccessPayload, sender: Address) -> Self {
        let mut controller = Self {
            is_public: payload.is_public,
            ..Self::default()
        };
        for (role, account) in payload.grants() {
            controller.insert_member(role, account, sender);
        }
        controller
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Returns `true` if `account` holds `role`.
    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        if self.is_public && role == Role::ApprovedCaller {
            return true;
        }
        self.members
            .get(&role)
            .is_some_and(|set| set.contains(account))
    }

    /// Current members of `role`, in address order.
    pub fn members(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The role currently required for `operation`.
    pub fn required_role(&self, operation: Operation) -> Role {
        self.requirements
            .get(&operation)
            .copied()
            .unwrap_or_else(|| operation.default_requirement())
    }

    /// Checks that `account` may perform `operation`.
    pub fn authorize(&self, account: &Address, operation: Operation) -> Result<(), AuthorizationError> {
        let role = self.required_role(operation);
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(AuthorizationError::MissingRole {
                account: *account,
                role,
                operation,
            })
        }
    }

    /// Grants `role` to `account`. Returns `false` if it was already held.
    pub fn grant_role(
        &mut self,
        sender: &Address,
        role: Role,
        account: Address,
    ) -> Result<bool, AuthorizationError> {
        self.authorize(sender, Operation::ManageRole(role))?;
        Ok(self.insert_member(role, account, *sender))
    }

    /// Revokes `role` from `account`. Returns `false` if it was not held.
    pub fn revoke_role(
        &mut self,
        sender: &Address,
        role: Role,
        account: &Address,
    ) -> Result<bool, AuthorizationError> {
        self.authorize(sender, Operation::ManageRole(role))?;
        Ok(self.remove_member(role, account, *sender))
    }

    /// `account` gives up `role` it holds.
    pub fn renounce_role(&mut self, account: &Address, role: Role) -> Result<(), AuthorizationError> {
        if !self.remove_member(role, account, *account) {
            return Err(AuthorizationError::NotRoleHolder {
                account: *account,
                role,
            });
        }
        Ok(())
    }

    /// Reassigns the requirement of `operation` to `role`, returning the
    /// previous requirement.
    pub fn set_requirement(
        &mut self,
        sender: &Address,
        operation: Operation,
        role: Role,
    ) -> Result<Role, AuthorizationError> {
        if !self.has_role(Role::Provisioner, sender) && !self.has_role(Role::Owner, sender) {
            return Err(AuthorizationError::RequirementChangeDenied(*sender));
        }

        let previous = self.required_role(operation);
        if role == operation.default_requirement() {
            self.requirements.remove(&operation);
        } else {
            self.requirements.insert(operation, role);
        }
        self.history.push(AccessEvent::RequirementChanged {
            operation,
            previous,
            new: role,
            sender: *sender,
        });
        Ok(previous)
    }

    pub fn history(&self) -> &[AccessEvent] {
        &self.history
    }

    /// How many times `account` lost `role`, by revocation or renouncement.
    pub fn revocation_count(&self, role: Role, account: &Address) -> usize {
        self.history
            .iter()
            .filter(|event| {
                matches!(event, AccessEvent::RoleRevoked { role: r, account: a, .. } if *r == role && a == account)
            })
            .count()
    }

    /// Number of requirement overrides currently in place.
    pub fn overridden_requirements(&self) -> usize {
        self.requirements.len()
    }

    fn insert_member(&mut self, role: Role, account: Address, sender: Address) -> bool {
        let inserted = self.members.entry(role).or_default().insert(account);
        if inserted {
            self.history.push(AccessEvent::RoleGranted {
                role,
                account,
                sender,
            });
        }
        inserted
    }

    fn remove_member(&mut self, role: Role, account: &Address, sender: Address) -> bool {
        let removed = self
            .members
            .get_mut(&role)
            .is_some_and(|set| set.remove(account));
        if removed {
            self.history.push(AccessEvent::RoleRevoked {
                role,
                account: *account,
                sender,
            });
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::labelled("owner")
    }

    fn factory() -> Address {
        Address::labelled("factory")
    }

    fn controller() -> AccessController {
        let payload = AccessPayload {
            owners: vec![owner()],
            dao: vec![Address::labelled("dao")],
            provisioners: vec![factory()],
            ..AccessPayload::default()
        };
        AccessController::from_payload(&payload, factory())
    }

    #[test]
    fn payload_grants_are_applied() {
        let ac = controller();
        assert!(ac.has_role(Role::Owner, &owner()));
        assert!(ac.has_role(Role::Dao, &Address::labelled("dao")));
        assert!(ac.has_role(Role::Provisioner, &factory()));
        assert!(ac.members(Role::Admin).is_empty());
        assert_eq!(ac.history().len(), 3);
    }

    #[test]
    fn owner_can_grant_and_revoke() {
        let mut ac = controller();
        let admin = Address::labelled("admin");
        assert!(ac.grant_role(&owner(), Role::Admin, admin).unwrap());
        assert!(!ac.grant_role(&owner(), Role::Admin, admin).unwrap());
        assert!(ac.has_role(Role::Admin, &admin));
        assert!(ac.revoke_role(&owner(), Role::Admin, &admin).unwrap());
        assert!(!ac.has_role(Role::Admin, &admin));
    }

    #[test]
    fn stranger_cannot_grant() {
        let mut ac = controller();
        let stranger = Address::labelled("stranger");
        let err = ac.grant_role(&stranger, Role::Admin, stranger).unwrap_err();
        assert_eq!(
            err,
            AuthorizationError::MissingRole {
                account: stranger,
                role: Role::Owner,
                operation: Operation::ManageRole(Role::Admin),
            }
        );
    }

    #[test]
    fn provisioner_administers_bootstrap_only() {
        let mut ac = controller();
        assert!(ac.grant_role(&factory(), Role::Bootstrap, factory()).unwrap());
        assert!(ac.grant_role(&factory(), Role::ApprovedCaller, factory()).is_err());
    }

    #[test]
    fn requirement_override_and_restore() {
        let mut ac = controller();
        let op = Operation::SetRewardsManager;
        let previous = ac.set_requirement(&factory(), op, Role::Bootstrap).unwrap();
        assert_eq!(previous, Role::Owner);
        assert_eq!(ac.required_role(op), Role::Bootstrap);
        assert_eq!(ac.overridden_requirements(), 1);

        ac.set_requirement(&factory(), op, previous).unwrap();
        assert_eq!(ac.required_role(op), Role::Owner);
        assert_eq!(ac.overridden_requirements(), 0);
    }

    #[test]
    fn stranger_cannot_reassign_requirements() {
        let mut ac = controller();
        let stranger = Address::labelled("stranger");
        assert_eq!(
            ac.set_requirement(&stranger, Operation::UpdateFees, Role::Bootstrap)
                .unwrap_err(),
            AuthorizationError::RequirementChangeDenied(stranger)
        );
    }

    #[test]
    fn renounce_requires_membership_and_is_counted() {
        let mut ac = controller();
        ac.renounce_role(&factory(), Role::Provisioner).unwrap();
        assert_eq!(ac.revocation_count(Role::Provisioner, &factory()), 1);
        assert!(ac.renounce_role(&factory(), Role::Provisioner).is_err());
        assert_eq!(ac.revocation_count(Role::Provisioner, &factory()), 1);
    }

    #[test]
    fn public_controller_approves_everyone() {
        let payload = AccessPayload {
            is_public: true,
            ..AccessPayload::default()
        };
        let ac = AccessController::from_payload(&payload, factory());
        assert!(ac.has_role(Role::ApprovedCaller, &Address::labelled("anyone")));
        assert!(!ac.has_role(Role::Owner, &Address::labelled("anyone")));
    }
}
