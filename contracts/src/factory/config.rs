//! # Factory Configuration
//!
//! Everything the orchestrator needs to know before it can create an
//! instance: who owns the factory, which template every component kind is
//! cloned from, the default admin list, two durations, and the indexed
//! fee-package table.
//!
//! The configuration is validated once at bootstrap. Templates may still be
//! unset at that point (they are published later, e.g. by `tessera init`),
//! so a missing template only fails the creation call that needs it.

use serde::{Deserialize, Serialize};

use tessera_protocol::config::{
    DEFAULT_VESTING_DURATION_SECS, DEFAULT_WITHDRAWAL_WINDOW_SECS, MAX_FEE_BPS,
};
use tessera_protocol::{Address, ComponentKind, ConfigurationError, ValidationError};

use crate::components::FeeConfig;

// ---------------------------------------------------------------------------
// TemplateSet
// ---------------------------------------------------------------------------

/// One template address per component kind. `Address::ZERO` means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSet {
    #[serde(default)]
    pub primary_container: Address,
    #[serde(default)]
    pub access_controller: Address,
    #[serde(default)]
    pub price_manager: Address,
    #[serde(default)]
    pub withdrawal_gate: Address,
    #[serde(default)]
    pub rewards_manager: Address,
    #[serde(default)]
    pub context_manager: Address,
}

impl TemplateSet {
    /// Derives a full set from `namespace`, one labelled address per kind.
    /// Two factories built from the same namespace share templates.
    pub fn labelled(namespace: &str) -> Self {
        let mut set = Self::default();
        for kind in ComponentKind::ALL {
            set.set(kind, Address::labelled(&format!("{namespace}/{}", kind.tag())));
        }
        set
    }

    pub fn get(&self, kind: ComponentKind) -> Address {
        match kind {
            ComponentKind::PrimaryContainer => self.primary_container,
            ComponentKind::AccessController => self.access_controller,
            ComponentKind::PriceManager => self.price_manager,
            ComponentKind::WithdrawalGate => self.withdrawal_gate,
            ComponentKind::RewardsManager => self.rewards_manager,
            ComponentKind::ContextManager => self.context_manager,
        }
    }

    pub fn set(&mut self, kind: ComponentKind, template: Address) {
        let slot = match kind {
            ComponentKind::PrimaryContainer => &mut self.primary_container,
            ComponentKind::AccessController => &mut self.access_controller,
            ComponentKind::PriceManager => &mut self.price_manager,
            ComponentKind::WithdrawalGate => &mut self.withdrawal_gate,
            ComponentKind::RewardsManager => &mut self.rewards_manager,
            ComponentKind::ContextManager => &mut self.context_manager,
        };
        *slot = template;
    }

    /// The template for `kind`, or `MissingTemplate` if unset.
    pub fn require(&self, kind: ComponentKind) -> Result<Address, ConfigurationError> {
        let template = self.get(kind);
        if template.is_zero() {
            return Err(ConfigurationError::MissingTemplate(kind));
        }
        Ok(template)
    }
}

// ---------------------------------------------------------------------------
// FeePackage
// ---------------------------------------------------------------------------

/// One row of the factory's fee table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePackage {
    pub management_fee_bps: u16,
    pub performance_fee_bps: u16,
    pub recipient: Address,
}

impl FeePackage {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, bps) in [
            ("management fee", self.management_fee_bps),
            ("performance fee", self.performance_fee_bps),
        ] {
            if bps > MAX_FEE_BPS {
                return Err(ValidationError::FeeTooHigh {
                    field,
                    bps,
                    max: MAX_FEE_BPS,
                });
            }
        }
        if self.recipient.is_zero() {
            return Err(ValidationError::ZeroAddress("fee recipient"));
        }
        Ok(())
    }
}

impl From<FeePackage> for FeeConfig {
    fn from(package: FeePackage) -> Self {
        FeeConfig {
            management_fee_bps: package.management_fee_bps,
            performance_fee_bps: package.performance_fee_bps,
            recipient: package.recipient,
        }
    }
}

// ---------------------------------------------------------------------------
// GlobalConfiguration
// ---------------------------------------------------------------------------

fn default_vesting() -> u64 {
    DEFAULT_VESTING_DURATION_SECS
}

fn default_window() -> u64 {
    DEFAULT_WITHDRAWAL_WINDOW_SECS
}

/// Factory-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfiguration {
    /// The only identity allowed to change this configuration.
    pub owner: Address,
    #[serde(default)]
    pub templates: TemplateSet,
    /// Granted `Admin` on instances created with `with_admin`.
    #[serde(default)]
    pub admins: Vec<Address>,
    #[serde(default = "default_vesting")]
    pub vesting_duration_secs: u64,
    #[serde(default = "default_window")]
    pub withdrawal_window_secs: u64,
    #[serde(default)]
    pub fee_packages: Vec<FeePackage>,
}

impl GlobalConfiguration {
    /// A configuration with default durations, no admins and an empty fee
    /// table.
    pub fn new(owner: Address, templates: TemplateSet) -> Self {
        Self {
            owner,
            templates,
            admins: Vec::new(),
            vesting_duration_secs: DEFAULT_VESTING_DURATION_SECS,
            withdrawal_window_secs: DEFAULT_WITHDRAWAL_WINDOW_SECS,
            fee_packages: Vec::new(),
        }
    }

    pub fn with_admins(mut self, admins: Vec<Address>) -> Self {
        self.admins = admins;
        self
    }

    pub fn with_fee_package(mut self, package: FeePackage) -> Self {
        self.fee_packages.push(package);
        self
    }

    /// Bootstrap validation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.owner.is_zero() {
            return Err(ValidationError::ZeroAddress("factory owner"));
        }
        if self.admins.iter().any(Address::is_zero) {
            return Err(ValidationError::ZeroAddress("admin"));
        }
        if self.vesting_duration_secs == 0 {
            return Err(ValidationError::ZeroDuration("vesting duration"));
        }
        if self.withdrawal_window_secs == 0 {
            return Err(ValidationError::ZeroDuration("withdrawal window"));
        }
        self.fee_packages.iter().try_for_each(FeePackage::validate)
    }

    /// Looks up a fee package by index.
    pub fn fee_package(&self, index: usize) -> Result<&FeePackage, ValidationError> {
        if self.fee_packages.is_empty() {
            return Err(ValidationError::EmptyFeeTable);
        }
        self.fee_packages
            .get(index)
            .ok_or(ValidationError::FeePackageOutOfRange {
                index,
                len: self.fee_packages.len(),
            })
    }
}
