//! # Ledger
//!
//! The shared world the factory deploys into. It plays the role a chain
//! plays for contracts:
//!
//! - **implementations** — one published implementation per template
//!   address. A template is the shared logic of a component kind.
//! - **deployments** — every deployed component: its kind, the template it
//!   runs, who deployed it, and its own isolated state.
//! - **address space** — the deterministic predict/deploy bookkeeping.
//!
//! Calls that change a component name their caller. Initialization is
//! reserved for the deployer; everything else is checked against the
//! component's access controller.
//!
//! Between [`Ledger::begin`] and [`Ledger::commit_changes`] every write is
//! journaled, so a failed run can be undone with [`Ledger::rollback`] and a
//! successful one reports exactly what it wrote through
//! [`Ledger::changes`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tessera_protocol::config::MAX_FEE_BPS;
use tessera_protocol::{
    Address, AddressSpace, AuthorizationError, ComponentKind, ComponentSeed, ConfigurationError,
    FactoryResult, Operation, Role, StateError, ValidationError,
};

use crate::components::{
    AccessController, AssetContainer, ComponentInit, ComponentState, ContextManager, FeeConfig,
    PriceManager, RewardsManager, WithdrawalGate,
};
use crate::journal::Journal;

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

/// One deployed component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub kind: ComponentKind,
    /// Template whose implementation this component runs.
    pub implementation: Address,
    /// The identity that deployed it; the only one allowed to initialize it.
    pub deployer: Address,
    /// `None` until initialized.
    state: Option<ComponentState>,
}

impl Deployment {
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&ComponentState> {
        self.state.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Change tracking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LedgerJournal {
    implementations: Journal<Address, ComponentKind>,
    deployments: Journal<Address, Deployment>,
    /// `(deployer, seed)` pairs consumed during the run.
    seeds: Vec<(Address, ComponentSeed)>,
}

/// Entries written during a run, with their current values.
#[derive(Debug, Default)]
pub struct LedgerChanges<'a> {
    pub implementations: Vec<(Address, ComponentKind)>,
    pub deployments: Vec<(Address, &'a Deployment)>,
    pub seeds: Vec<(Address, ComponentSeed)>,
}

impl LedgerChanges<'_> {
    pub fn len(&self) -> usize {
        self.implementations.len() + self.deployments.len() + self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Published implementations, deployed components, and the address space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    space: AddressSpace,
    implementations: BTreeMap<Address, ComponentKind>,
    deployments: BTreeMap<Address, Deployment>,
    #[serde(skip)]
    journal: Option<LedgerJournal>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from persisted entries.
    pub fn restore(
        implementations: impl IntoIterator<Item = (Address, ComponentKind)>,
        deployments: impl IntoIterator<Item = (Address, Deployment)>,
        used_seeds: impl IntoIterator<Item = (Address, ComponentSeed)>,
    ) -> Self {
        let implementations: BTreeMap<_, _> = implementations.into_iter().collect();
        let deployments: BTreeMap<_, _> = deployments.into_iter().collect();
        let occupied = implementations
            .keys()
            .chain(deployments.keys())
            .copied()
            .collect::<Vec<_>>();
        Self {
            space: AddressSpace::restore(used_seeds, occupied),
            implementations,
            deployments,
            journal: None,
        }
    }

    // -- Runs ---------------------------------------------------------------

    /// Starts a run. Writes of an earlier open run are kept.
    pub fn begin(&mut self) {
        self.journal = Some(LedgerJournal::default());
    }

    /// Undoes every write since [`begin`](Self::begin).
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (deployer, seed) in &journal.seeds {
            self.space.release_seed(*deployer, seed);
        }
        for at in journal
            .implementations
            .inserted()
            .chain(journal.deployments.inserted())
        {
            self.space.vacate(at);
        }
        journal.implementations.undo(&mut self.implementations);
        journal.deployments.undo(&mut self.deployments);
    }

    /// Ends the run and keeps its writes.
    pub fn commit_changes(&mut self) {
        self.journal = None;
    }

    /// What the open run has written so far. Empty outside a run.
    pub fn changes(&self) -> LedgerChanges<'_> {
        let Some(journal) = &self.journal else {
            return LedgerChanges::default();
        };
        LedgerChanges {
            implementations: journal
                .implementations
                .keys()
                .filter_map(|at| self.implementations.get(at).map(|kind| (*at, *kind)))
                .collect(),
            deployments: journal
                .deployments
                .keys()
                .filter_map(|at| self.deployments.get(at).map(|d| (*at, d)))
                .collect(),
            seeds: journal.seeds.clone(),
        }
    }

    /// Every entry, as if a single run had written the whole ledger.
    pub fn snapshot(&self) -> LedgerChanges<'_> {
        LedgerChanges {
            implementations: self
                .implementations
                .iter()
                .map(|(at, kind)| (*at, *kind))
                .collect(),
            deployments: self.deployments().map(|(at, d)| (*at, d)).collect(),
            seeds: self.space.used_seeds().copied().collect(),
        }
    }

    fn note_implementation(&mut self, at: &Address) {
        if let Some(journal) = &mut self.journal {
            journal.implementations.record(at, self.implementations.get(at));
        }
    }

    fn note_deployment(&mut self, at: &Address) {
        if let Some(journal) = &mut self.journal {
            journal.deployments.record(at, self.deployments.get(at));
        }
    }

    // -- Implementations ----------------------------------------------------

    /// Publishes the implementation of `kind` at the fixed address `at`,
    /// making `at` usable as a template.
    pub fn publish_implementation(&mut self, at: Address, kind: ComponentKind) -> FactoryResult<()> {
        if at.is_zero() {
            return Err(ValidationError::ZeroAddress("implementation").into());
        }
        self.space.occupy(at)?;
        self.note_implementation(&at);
        self.implementations.insert(at, kind);
        tracing::debug!(%at, %kind, "implementation published");
        Ok(())
    }

    /// The component kind implemented at `template`, if any.
    pub fn implementation(&self, template: &Address) -> Option<ComponentKind> {
        self.implementations.get(template).copied()
    }

    /// Checks that `template` is usable to deploy a `kind`.
    pub fn resolve_template(&self, template: Address, kind: ComponentKind) -> FactoryResult<()> {
        if template.is_zero() {
            return Err(ConfigurationError::InvalidTemplate.into());
        }
        match self.implementation(&template) {
            None => Err(ConfigurationError::UnknownTemplate(template).into()),
            Some(actual) if actual != kind => Err(ConfigurationError::TemplateKindMismatch {
                template,
                expected: kind,
                actual,
            }
            .into()),
            Some(_) => Ok(()),
        }
    }

    // -- Deployment ---------------------------------------------------------

    /// Where `deployer` would land a component deployed from `template`
    /// under `seed`.
    pub fn predict(&self, deployer: Address, seed: &ComponentSeed, template: Address) -> Address {
        self.space.predict(deployer, seed, template)
    }

    /// Deploys a fresh, uninitialized `kind` from `template`. The returned
    /// address equals [`predict`](Self::predict).
    pub fn deploy(
        &mut self,
        deployer: Address,
        seed: &ComponentSeed,
        kind: ComponentKind,
        template: Address,
    ) -> FactoryResult<Address> {
        self.resolve_template(template, kind)?;
        let address = self.space.deploy(deployer, seed, template)?;
        if let Some(journal) = &mut self.journal {
            journal.seeds.push((deployer, *seed));
        }
        self.note_deployment(&address);
        self.deployments.insert(
            address,
            Deployment {
                kind,
                implementation: template,
                deployer,
                state: None,
            },
        );
        Ok(address)
    }

    pub fn deployment(&self, at: &Address) -> Option<&Deployment> {
        self.deployments.get(at)
    }

    pub fn is_deployed(&self, at: &Address) -> bool {
        self.deployments.contains_key(at)
    }

    pub fn deployments(&self) -> impl Iterator<Item = (&Address, &Deployment)> {
        self.deployments.iter()
    }

    pub fn address_space(&self) -> &AddressSpace {
        &self.space
    }

    /// Runs the constructor of the component at `at`. Deployer only, once.
    pub fn initialize(&mut self, caller: Address, at: Address, init: ComponentInit) -> FactoryResult<()> {
        self.note_deployment(&at);
        let deployment = self
            .deployments
            .get_mut(&at)
            .ok_or(StateError::NotDeployed(at))?;

        if deployment.deployer != caller {
            return Err(AuthorizationError::NotDeployer {
                caller,
                component: at,
            }
            .into());
        }
        if deployment.state.is_some() {
            return Err(StateError::AlreadyInitialized(at).into());
        }
        if init.kind() != deployment.kind {
            return Err(StateError::WrongComponentKind {
                address: at,
                expected: deployment.kind,
                actual: init.kind(),
            }
            .into());
        }

        deployment.state = Some(init.construct(caller));
        tracing::debug!(%at, kind = %deployment.kind, "component initialized");
        Ok(())
    }

    // -- Typed access -------------------------------------------------------

    fn state(&self, at: &Address) -> FactoryResult<&ComponentState> {
        let deployment = self.deployments.get(at).ok_or(StateError::NotDeployed(*at))?;
        deployment
            .state
            .as_ref()
            .ok_or_else(|| StateError::NotInitialized(*at).into())
    }

    fn state_mut(&mut self, at: &Address) -> FactoryResult<&mut ComponentState> {
        self.note_deployment(at);
        let deployment = self
            .deployments
            .get_mut(at)
            .ok_or(StateError::NotDeployed(*at))?;
        deployment
            .state
            .as_mut()
            .ok_or_else(|| StateError::NotInitialized(*at).into())
    }

    pub fn access_controller(&self, at: &Address) -> FactoryResult<&AccessController> {
        match self.state(at)? {
            ComponentState::AccessController(c) => Ok(c),
            other => Err(wrong_kind(at, ComponentKind::AccessController, other)),
        }
    }

    pub fn asset_container(&self, at: &Address) -> FactoryResult<&AssetContainer> {
        match self.state(at)? {
            ComponentState::PrimaryContainer(c) => Ok(c),
            other => Err(wrong_kind(at, ComponentKind::PrimaryContainer, other)),
        }
    }

    pub fn price_manager(&self, at: &Address) -> FactoryResult<&PriceManager> {
        match self.state(at)? {
            ComponentState::PriceManager(c) => Ok(c),
            other => Err(wrong_kind(at, ComponentKind::PriceManager, other)),
        }
    }

    pub fn withdrawal_gate(&self, at: &Address) -> FactoryResult<&WithdrawalGate> {
        match self.state(at)? {
            ComponentState::WithdrawalGate(c) => Ok(c),
            other => Err(wrong_kind(at, ComponentKind::WithdrawalGate, other)),
        }
    }

    pub fn rewards_manager(&self, at: &Address) -> FactoryResult<&RewardsManager> {
        match self.state(at)? {
            ComponentState::RewardsManager(c) => Ok(c),
            other => Err(wrong_kind(at, ComponentKind::RewardsManager, other)),
        }
    }

    pub fn context_manager(&self, at: &Address) -> FactoryResult<&ContextManager> {
        match self.state(at)? {
            ComponentState::ContextManager(c) => Ok(c),
            other => Err(wrong_kind(at, ComponentKind::ContextManager, other)),
        }
    }

    fn access_controller_mut(&mut self, at: &Address) -> FactoryResult<&mut AccessController> {
        match self.state_mut(at)? {
            ComponentState::AccessController(c) => Ok(c),
            other => Err(wrong_kind(at, ComponentKind::AccessController, other)),
        }
    }

    fn asset_container_mut(&mut self, at: &Address) -> FactoryResult<&mut AssetContainer> {
        match self.state_mut(at)? {
            ComponentState::PrimaryContainer(c) => Ok(c),
            other => Err(wrong_kind(at, ComponentKind::PrimaryContainer, other)),
        }
    }

    fn rewards_manager_mut(&mut self, at: &Address) -> FactoryResult<&mut RewardsManager> {
        match self.state_mut(at)? {
            ComponentState::RewardsManager(c) => Ok(c),
            other => Err(wrong_kind(at, ComponentKind::RewardsManager, other)),
        }
    }

    // -- Access control -----------------------------------------------------

    pub fn grant_role(
        &mut self,
        caller: Address,
        controller: Address,
        role: Role,
        account: Address,
    ) -> FactoryResult<bool> {
        Ok(self
            .access_controller_mut(&controller)?
            .grant_role(&caller, role, account)?)
    }

    pub fn revoke_role(
        &mut self,
        caller: Address,
        controller: Address,
        role: Role,
        account: Address,
    ) -> FactoryResult<bool> {
        Ok(self
            .access_controller_mut(&controller)?
            .revoke_role(&caller, role, &account)?)
    }

    pub fn renounce_role(&mut self, caller: Address, controller: Address, role: Role) -> FactoryResult<()> {
        Ok(self
            .access_controller_mut(&controller)?
            .renounce_role(&caller, role)?)
    }

    pub fn set_requirement(
        &mut self,
        caller: Address,
        controller: Address,
        operation: Operation,
        role: Role,
    ) -> FactoryResult<Role> {
        Ok(self
            .access_controller_mut(&controller)?
            .set_requirement(&caller, operation, role)?)
    }

    // -- Component calls ----------------------------------------------------

    /// Wires `rewards_manager` into the container at `container`. One-time;
    /// guarded by [`Operation::SetRewardsManager`].
    pub fn set_rewards_manager(
        &mut self,
        caller: Address,
        container: Address,
        rewards_manager: Address,
    ) -> FactoryResult<()> {
        let current = self.asset_container(&container)?;
        let controller = current.access_controller;
        let already_wired = current.rewards_manager.is_some();

        self.access_controller(&controller)?
            .authorize(&caller, Operation::SetRewardsManager)?;
        if already_wired {
            return Err(StateError::AlreadyWired(container).into());
        }
        self.rewards_manager(&rewards_manager)?;

        self.asset_container_mut(&container)?.rewards_manager = Some(rewards_manager);
        tracing::debug!(%container, %rewards_manager, "rewards manager wired");
        Ok(())
    }

    /// Replaces the container's fee configuration. Guarded by
    /// [`Operation::UpdateFees`].
    pub fn update_fees(&mut self, caller: Address, container: Address, fees: FeeConfig) -> FactoryResult<()> {
        let controller = self.asset_container(&container)?.access_controller;
        self.access_controller(&controller)?
            .authorize(&caller, Operation::UpdateFees)?;

        check_fee("management fee", fees.management_fee_bps)?;
        check_fee("performance fee", fees.performance_fee_bps)?;
        if fees.recipient.is_zero() {
            return Err(ValidationError::ZeroAddress("fee recipient").into());
        }

        self.asset_container_mut(&container)?.fees = fees;
        Ok(())
    }

    /// One-time vesting setup of a rewards manager, reserved for its
    /// deployer.
    pub fn setup_vesting(&mut self, caller: Address, rewards_manager: Address, secs: u64) -> FactoryResult<()> {
        let deployer = self
            .deployments
            .get(&rewards_manager)
            .map(|d| d.deployer)
            .ok_or(StateError::NotDeployed(rewards_manager))?;
        if deployer != caller {
            return Err(AuthorizationError::NotDeployer {
                caller,
                component: rewards_manager,
            }
            .into());
        }
        if secs == 0 {
            return Err(ValidationError::ZeroDuration("vesting duration").into());
        }

        let rm = self.rewards_manager_mut(&rewards_manager)?;
        if rm.vesting_secs.is_some() {
            return Err(StateError::AlreadyWired(rewards_manager).into());
        }
        rm.vesting_secs = Some(secs);
        Ok(())
    }
}

fn wrong_kind(at: &Address, expected: ComponentKind, actual: &ComponentState) -> tessera_protocol::FactoryError {
    StateError::WrongComponentKind {
        address: *at,
        expected,
        actual: actual.kind(),
    }
    .into()
}

fn check_fee(field: &'static str, bps: u16) -> FactoryResult<()> {
    if bps > MAX_FEE_BPS {
        return Err(ValidationError::FeeTooHigh {
            field,
            bps,
            max: MAX_FEE_BPS,
        }
        .into());
    }
    Ok(())
}
