//! # Asset Container
//!
//! The primary component of an instance. Its address is the instance's key
//! in the factory registry. It holds references to its siblings and a
//! private copy of the fee configuration it was created with.
//!
//! Asset accounting itself is not modelled here.

use serde::{Deserialize, Serialize};

use tessera_protocol::Address;

/// Human-facing metadata of the managed asset share.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub name: String,
    pub symbol: String,
}

impl AssetMetadata {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
        }
    }
}

/// The container's own fee configuration. Copied at creation; never a live
/// reference to the factory's fee table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub management_fee_bps: u16,
    pub performance_fee_bps: u16,
    pub recipient: Address,
}

/// Constructor arguments of an [`AssetContainer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetContainerInit {
    pub metadata: AssetMetadata,
    pub asset: Address,
    pub access_controller: Address,
    pub price_manager: Address,
    pub withdrawal_gate: Address,
    pub fees: FeeConfig,
}

/// Asset container state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetContainer {
    pub metadata: AssetMetadata,
    pub asset: Address,
    pub access_controller: Address,
    pub price_manager: Address,
    pub withdrawal_gate: Address,
    pub rewards_manager: Option<Address>,
    pub fees: FeeConfig,
}

impl From<AssetContainerInit> for AssetContainer {
    fn from(init: AssetContainerInit) -> Self {
        Self {
            metadata: init.metadata,
            asset: init.asset,
            access_controller: init.access_controller,
            price_manager: init.price_manager,
            withdrawal_gate: init.withdrawal_gate,
            rewards_manager: None,
            fees: init.fees,
        }
    }
}
