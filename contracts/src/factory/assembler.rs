//! # Configuration Assembler
//!
//! Builds the payload an instance's access controller is initialized with.
//! The payload is the only place initial authority is handed out:
//!
//! | Role             | Members                                            |
//! |------------------|----------------------------------------------------|
//! | `Owner`          | the instance owner                                 |
//! | `Admin`          | the factory's admin list, only with `with_admin`   |
//! | `Dao`            | the fee recipient                                  |
//! | `ApprovedCaller` | every live sibling component except the controller |
//! | `Provisioner`    | the orchestrator                                   |
//!
//! "Live" matters for seeded creation: the deferred components do not exist
//! yet, so they are left out here and granted `ApprovedCaller` when they
//! are deployed.

use tessera_protocol::{Address, ComponentKind};

use crate::components::AccessPayload;
use crate::factory::config::GlobalConfiguration;
use crate::factory::registry::InstanceAddresses;

/// The sibling components that exist at assembly time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownComponents {
    pub primary_container: Option<Address>,
    pub price_manager: Option<Address>,
    pub withdrawal_gate: Option<Address>,
    pub rewards_manager: Option<Address>,
    pub context_manager: Option<Address>,
}

impl KnownComponents {
    /// Phase-1 components are always known; deferred ones only when
    /// `include_deferred`.
    pub fn from_addresses(addresses: &InstanceAddresses, include_deferred: bool) -> Self {
        let deferred = |kind: ComponentKind| include_deferred.then(|| addresses.get(kind));
        Self {
            primary_container: Some(addresses.primary_container),
            price_manager: Some(addresses.price_manager),
            withdrawal_gate: Some(addresses.withdrawal_gate),
            rewards_manager: deferred(ComponentKind::RewardsManager),
            context_manager: deferred(ComponentKind::ContextManager),
        }
    }

    /// Known components in a stable order.
    pub fn live(&self) -> Vec<Address> {
        [
            self.primary_container,
            self.price_manager,
            self.withdrawal_gate,
            self.rewards_manager,
            self.context_manager,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Builds the access-controller payload of a new instance.
pub fn build_access_payload(
    config: &GlobalConfiguration,
    orchestrator: Address,
    owner: Address,
    with_admin: bool,
    dao_recipient: Address,
    known: &KnownComponents,
) -> AccessPayload {
    AccessPayload {
        is_public: false,
        owners: vec![owner],
        admins: if with_admin {
            config.admins.clone()
        } else {
            Vec::new()
        },
        dao: vec![dao_recipient],
        approved_callers: known.live(),
        provisioners: vec![orchestrator],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::config::TemplateSet;

    fn config() -> GlobalConfiguration {
        GlobalConfiguration::new(Address::labelled("factory-owner"), TemplateSet::default())
            .with_admins(vec![Address::labelled("admin-1"), Address::labelled("admin-2")])
    }

    fn addresses() -> InstanceAddresses {
        InstanceAddresses::from_fn(|kind| Address::labelled(kind.tag()))
    }

    #[test]
    fn eager_payload_lists_every_sibling() {
        let known = KnownComponents::from_addresses(&addresses(), true);
        let payload = build_access_payload(
            &config(),
            Address::labelled("factory"),
            Address::labelled("owner"),
            true,
            Address::labelled("dao"),
            &known,
        );

        assert!(!payload.is_public);
        assert_eq!(payload.owners, vec![Address::labelled("owner")]);
        assert_eq!(payload.dao, vec![Address::labelled("dao")]);
        assert_eq!(payload.admins.len(), 2);
        assert_eq!(payload.approved_callers.len(), 5);
        assert!(!payload
            .approved_callers
            .contains(&addresses().access_controller));
        assert_eq!(payload.provisioners, vec![Address::labelled("factory")]);
    }

    #[test]
    fn seeded_payload_skips_deferred_and_admins() {
        let known = KnownComponents::from_addresses(&addresses(), false);
        let payload = build_access_payload(
            &config(),
            Address::labelled("factory"),
            Address::labelled("owner"),
            false,
            Address::labelled("dao"),
            &known,
        );

        assert!(payload.admins.is_empty());
        assert_eq!(
            payload.approved_callers,
            vec![
                addresses().primary_container,
                addresses().price_manager,
                addresses().withdrawal_gate,
            ]
        );
    }
}
