//! # Component Kinds
//!
//! An instance is always the same six components. Four are deployed when
//! the instance is created (Phase 1); two may be deferred to a later call
//! (Phase 2).
//!
//! Each kind carries a fixed tag that is mixed into its component seed.
//! The tags are part of every predicted address, so they are frozen.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the six component kinds that make up an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    /// The asset container. Its address is the instance's primary key.
    PrimaryContainer,
    /// The role engine every other component consults.
    AccessController,
    PriceManager,
    WithdrawalGate,
    RewardsManager,
    ContextManager,
}

impl ComponentKind {
    /// All six kinds, in deployment order.
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::PrimaryContainer,
        ComponentKind::AccessController,
        ComponentKind::PriceManager,
        ComponentKind::WithdrawalGate,
        ComponentKind::RewardsManager,
        ComponentKind::ContextManager,
    ];

    /// Components deployed synchronously by every creation call.
    pub const PHASE_ONE: [ComponentKind; 4] = [
        ComponentKind::PrimaryContainer,
        ComponentKind::AccessController,
        ComponentKind::PriceManager,
        ComponentKind::WithdrawalGate,
    ];

    /// Components whose deployment may be deferred.
    pub const DEFERRED: [ComponentKind; 2] =
        [ComponentKind::RewardsManager, ComponentKind::ContextManager];

    /// The seed tag for this kind.
    pub const fn tag(self) -> &'static str {
        match self {
            ComponentKind::PrimaryContainer => "primary-container",
            ComponentKind::AccessController => "access-controller",
            ComponentKind::PriceManager => "price-manager",
            ComponentKind::WithdrawalGate => "withdrawal-gate",
            ComponentKind::RewardsManager => "rewards-manager",
            ComponentKind::ContextManager => "context-manager",
        }
    }

    /// Returns `true` for the two Phase-2 kinds.
    pub const fn is_deferred(self) -> bool {
        matches!(
            self,
            ComponentKind::RewardsManager | ComponentKind::ContextManager
        )
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error returned when parsing an unknown component tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown component kind: {0}")]
pub struct UnknownComponentKind(pub String);

impl FromStr for ComponentKind {
    type Err = UnknownComponentKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| UnknownComponentKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tags_are_unique() {
        let tags: HashSet<_> = ComponentKind::ALL.iter().map(|k| k.tag()).collect();
        assert_eq!(tags.len(), ComponentKind::ALL.len());
    }

    #[test]
    fn test_phases_partition_all_kinds() {
        assert_eq!(
            ComponentKind::PHASE_ONE.len() + ComponentKind::DEFERRED.len(),
            ComponentKind::ALL.len()
        );
        assert!(ComponentKind::PHASE_ONE.iter().all(|k| !k.is_deferred()));
        assert!(ComponentKind::DEFERRED.iter().all(|k| k.is_deferred()));
    }

    #[test]
    fn test_parse_round_trip() {
        for kind in ComponentKind::ALL {
            assert_eq!(kind.tag().parse::<ComponentKind>().unwrap(), kind);
        }
        assert!("vault".parse::<ComponentKind>().is_err());
    }

    #[test]
    fn test_serde_uses_tag() {
        let json = serde_json::to_string(&ComponentKind::RewardsManager).unwrap();
        assert_eq!(json, "\"rewards-manager\"");
    }
}
