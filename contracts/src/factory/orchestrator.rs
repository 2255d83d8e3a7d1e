//! # Phase Orchestrator
//!
//! The public face of the factory. It creates instances in one of two ways
//! and finishes the ones it left incomplete:
//!
//! | Entry point                  | Seed          | Deploys          | Standing capability |
//! |------------------------------|---------------|------------------|---------------------|
//! | `create_eager`               | auto (index)  | all six          | released before return |
//! | `create_seeded`              | caller value  | Phase 1          | kept                |
//! | `deploy_deferred_component`  | from record   | one deferred     | released on completion |
//!
//! Both creation paths run the same `provision` routine, and eager creation
//! completes its two deferred components through the same routine
//! `deploy_deferred_component` uses. An eager instance and a seeded one
//! that was completed later end up wired identically.
//!
//! ## Atomicity
//!
//! Every mutating call holds the write lock for its whole duration and
//! writes the factory state in place inside a [`Staged`] run. The ledger
//! and registry journal each entry before its first write, so a call that
//! fails part way is undone entry by entry when the run drops. A call that
//! succeeds persists exactly the entries it touched, then commits the run.
//! The sequence index is taken through a [`SequenceReservation`] that is
//! rolled back unless the call commits. A failed call changes nothing: not
//! the registry, not the ledger, not the counter.

use chrono::Utc;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tessera_protocol::seed::{auto_master_seed, explicit_master_seed};
use tessera_protocol::{
    derive_component_seed, Address, AtomicSequence, AuthorizationError, ComponentKind,
    FactoryError, FactoryResult, MasterSeed, Operation, Role, SeedMode, SeedValue,
    SequenceGenerator, SequenceReservation, StateError, ValidationError,
};

use crate::components::{AssetContainerInit, AssetMetadata, ComponentInit, FeeConfig};
use crate::factory::assembler::{build_access_payload, KnownComponents};
use crate::factory::bootstrap::{release_standing_capability, with_window};
use crate::factory::config::{FeePackage, GlobalConfiguration};
use crate::factory::registry::{
    CompletionTransition, InstanceAddresses, InstanceRecord, InstanceRegistry, InstanceState,
};
use crate::factory::store::{Commit, FactoryDb};
use crate::ledger::Ledger;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Arguments shared by both creation entry points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub metadata: AssetMetadata,
    /// The underlying asset the container will manage.
    pub asset: Address,
    pub owner: Address,
    /// Grant the factory's admin list `Admin` on the new instance.
    pub with_admin: bool,
    /// Index into the factory's fee-package table.
    pub fee_package: usize,
}

impl CreateRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.metadata.name.trim().is_empty() {
            return Err(ValidationError::EmptyMetadata("name"));
        }
        if self.metadata.symbol.trim().is_empty() {
            return Err(ValidationError::EmptyMetadata("symbol"));
        }
        if self.asset.is_zero() {
            return Err(ValidationError::ZeroAddress("asset"));
        }
        if self.owner.is_zero() {
            return Err(ValidationError::ZeroAddress("owner"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FactoryState {
    config: GlobalConfiguration,
    ledger: Ledger,
    registry: InstanceRegistry,
}

/// An open run over the factory state. Rolls back on drop unless
/// committed.
struct Staged<'a> {
    state: &'a mut FactoryState,
    committed: bool,
}

impl<'a> Staged<'a> {
    fn begin(state: &'a mut FactoryState) -> Self {
        state.ledger.begin();
        state.registry.begin();
        Self {
            state,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.state.ledger.commit_changes();
        self.state.registry.commit_changes();
        self.committed = true;
    }
}

impl Deref for Staged<'_> {
    type Target = FactoryState;

    fn deref(&self) -> &FactoryState {
        self.state
    }
}

impl DerefMut for Staged<'_> {
    fn deref_mut(&mut self) -> &mut FactoryState {
        self.state
    }
}

impl Drop for Staged<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.state.ledger.rollback();
            self.state.registry.rollback();
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// The provisioning orchestrator.
///
/// `identity` is the address the orchestrator deploys and calls as. Every
/// predicted address depends on it.
pub struct Orchestrator<S: SequenceGenerator = AtomicSequence> {
    identity: Address,
    state: RwLock<FactoryState>,
    sequence: Arc<S>,
    store: Option<FactoryDb>,
}

impl Orchestrator<AtomicSequence> {
    /// Bootstraps a factory over `ledger` with a fresh counter.
    pub fn new(identity: Address, config: GlobalConfiguration, ledger: Ledger) -> FactoryResult<Self> {
        Self::with_sequence(identity, config, ledger, Arc::new(AtomicSequence::new()))
    }

    /// Reopens a factory previously committed to `db`.
    pub fn open(db: FactoryDb) -> FactoryResult<Self> {
        let snapshot = db
            .load()?
            .ok_or_else(|| FactoryError::Storage("no factory in store".into()))?;

        let mut registry = InstanceRegistry::new();
        for record in snapshot.records {
            registry.put(record)?;
        }
        let latest = registry.latest_index().unwrap_or(0).max(snapshot.latest_index);

        tracing::info!(
            identity = %snapshot.identity,
            instances = registry.len(),
            latest_index = latest,
            "factory reopened"
        );
        Ok(Self {
            identity: snapshot.identity,
            state: RwLock::new(FactoryState {
                config: snapshot.config,
                ledger: snapshot.ledger,
                registry,
            }),
            sequence: Arc::new(AtomicSequence::starting_at(latest)),
            store: Some(db),
        })
    }
}

impl<S: SequenceGenerator> Orchestrator<S> {
    /// Bootstraps a factory with an injected sequence generator.
    pub fn with_sequence(
        identity: Address,
        config: GlobalConfiguration,
        ledger: Ledger,
        sequence: Arc<S>,
    ) -> FactoryResult<Self> {
        if identity.is_zero() {
            return Err(ValidationError::ZeroAddress("orchestrator identity").into());
        }
        config.validate()?;

        tracing::info!(%identity, owner = %config.owner, "factory bootstrapped");
        Ok(Self {
            identity,
            state: RwLock::new(FactoryState {
                config,
                ledger,
                registry: InstanceRegistry::new(),
            }),
            sequence,
            store: None,
        })
    }

    /// Attaches an empty durable store and writes the current state into
    /// it. A store that already holds a factory is refused; reopen it with
    /// [`Orchestrator::open`] instead.
    pub fn attach_store(mut self, db: FactoryDb) -> FactoryResult<Self> {
        if !db.is_empty()? {
            return Err(FactoryError::Storage("store already holds a factory".into()));
        }
        {
            let state = self.state.read();
            db.commit(&Commit {
                identity: self.identity,
                config: &state.config,
                ledger: state.ledger.snapshot(),
                records: state.registry.iter().collect(),
                latest_index: self.sequence.current(),
            })?;
        }
        self.store = Some(db);
        Ok(self)
    }

    // -- Creation -----------------------------------------------------------

    /// Creates a fully deployed instance from the next sequence index.
    pub fn create_eager(&self, request: CreateRequest) -> FactoryResult<InstanceRecord> {
        self.create(request, None)
    }

    /// Creates an instance from a caller-chosen seed, deploying Phase 1
    /// and predicting the deferred components.
    pub fn create_seeded(&self, request: CreateRequest, seed: SeedValue) -> FactoryResult<InstanceRecord> {
        self.create(request, Some(seed))
    }

    fn create(&self, request: CreateRequest, explicit: Option<SeedValue>) -> FactoryResult<InstanceRecord> {
        request.validate()?;

        let mut state = self.state.write();
        let mut staged = Staged::begin(&mut state);
        let reservation = SequenceReservation::reserve(&*self.sequence);
        let index = reservation.index();

        let (mode, master) = match &explicit {
            None => (SeedMode::Auto, auto_master_seed(index)),
            Some(value) => (SeedMode::Explicit, explicit_master_seed(value)),
        };

        let primary = self.provision(&mut staged, &request, index, mode, master)?;
        let record = staged
            .registry
            .record(&primary)
            .cloned()
            .ok_or(StateError::NotRegistered(primary))?;

        self.persist(&staged, index)?;
        staged.commit();
        reservation.commit();

        tracing::info!(
            index,
            %primary,
            mode = ?mode,
            state = %record.state(),
            "instance created"
        );
        Ok(record)
    }

    /// The shared finalize routine of both creation paths. Returns the
    /// primary address of the new instance.
    fn provision(
        &self,
        staging: &mut FactoryState,
        request: &CreateRequest,
        index: u64,
        mode: SeedMode,
        master: MasterSeed,
    ) -> FactoryResult<Address> {
        let eager = mode == SeedMode::Auto;
        let id = self.identity;
        let package = *staging.config.fee_package(request.fee_package)?;
        let fees = FeeConfig::from(package);

        let templates = staging.config.templates;
        for kind in ComponentKind::ALL {
            let template = templates.require(kind)?;
            staging.ledger.resolve_template(template, kind)?;
        }

        let addresses = InstanceAddresses::from_fn(|kind| {
            staging
                .ledger
                .predict(id, &derive_component_seed(&master, kind), templates.get(kind))
        });

        for kind in ComponentKind::PHASE_ONE {
            let seed = derive_component_seed(&master, kind);
            let deployed = staging.ledger.deploy(id, &seed, kind, templates.get(kind))?;
            debug_assert_eq!(deployed, addresses.get(kind));
        }

        let ac = addresses.access_controller;
        let known = KnownComponents::from_addresses(&addresses, eager);
        let payload = build_access_payload(
            &staging.config,
            id,
            request.owner,
            request.with_admin,
            package.recipient,
            &known,
        );

        let ledger = &mut staging.ledger;
        ledger.initialize(id, ac, ComponentInit::AccessController(payload))?;
        ledger.initialize(
            id,
            addresses.price_manager,
            ComponentInit::PriceManager {
                access_controller: ac,
            },
        )?;
        ledger.initialize(
            id,
            addresses.withdrawal_gate,
            ComponentInit::WithdrawalGate {
                access_controller: ac,
                window_secs: staging.config.withdrawal_window_secs,
            },
        )?;
        ledger.initialize(
            id,
            addresses.primary_container,
            ComponentInit::PrimaryContainer(AssetContainerInit {
                metadata: request.metadata.clone(),
                asset: request.asset,
                access_controller: ac,
                price_manager: addresses.price_manager,
                withdrawal_gate: addresses.withdrawal_gate,
                fees,
            }),
        )?;

        let primary = addresses.primary_container;
        staging.registry.put(InstanceRecord {
            index,
            seed_mode: mode,
            master_seed: master,
            metadata: request.metadata.clone(),
            asset: request.asset,
            addresses,
            rewards_manager_template: templates.rewards_manager,
            context_manager_template: templates.context_manager,
            rewards_manager_deployed: false,
            context_manager_deployed: false,
            owner: request.owner,
            with_admin: request.with_admin,
            fee_package: request.fee_package,
            fees,
            provisioner_active: true,
            created_at: Utc::now(),
            completed_at: None,
        })?;

        if eager {
            for kind in ComponentKind::DEFERRED {
                self.complete_component(staging, &primary, kind)?;
            }
        }
        Ok(primary)
    }

    // -- Deferred completion ------------------------------------------------

    /// Deploys and wires one deferred component of a seeded instance.
    ///
    /// Anyone may call this: every input (seed, template, wiring) is fixed
    /// by the instance record.
    pub fn deploy_deferred_component(&self, primary: Address, kind: ComponentKind) -> FactoryResult<Address> {
        let mut state = self.state.write();
        let mut staged = Staged::begin(&mut state);

        let address = self.complete_component(&mut staged, &primary, kind)?;
        let instance_state = staged
            .registry
            .record(&primary)
            .map(InstanceRecord::state)
            .ok_or(StateError::NotRegistered(primary))?;

        self.persist(&staged, self.sequence.current())?;
        staged.commit();

        tracing::info!(%primary, %kind, %address, state = %instance_state, "deferred component deployed");
        Ok(address)
    }

    /// Deploys, initializes and wires deferred `kind`, flips its flag, and
    /// releases the standing capability if that completed the instance.
    fn complete_component(
        &self,
        staging: &mut FactoryState,
        primary: &Address,
        kind: ComponentKind,
    ) -> FactoryResult<Address> {
        let id = self.identity;
        let record = staging
            .registry
            .record(primary)
            .cloned()
            .ok_or(StateError::NotRegistered(*primary))?;
        let template = record
            .deferred_template(kind)
            .ok_or(ValidationError::InvalidComponent(kind))?;
        if record.is_deployed(kind) {
            return Err(StateError::AlreadyDeployed(kind).into());
        }

        let seed = derive_component_seed(&record.master_seed, kind);
        let address = staging.ledger.deploy(id, &seed, kind, template)?;
        debug_assert_eq!(address, record.addresses.get(kind));

        let ac = record.addresses.access_controller;
        let ledger = &mut staging.ledger;
        match kind {
            ComponentKind::RewardsManager => {
                ledger.initialize(
                    id,
                    address,
                    ComponentInit::RewardsManager {
                        access_controller: ac,
                    },
                )?;
                ledger.setup_vesting(id, address, staging.config.vesting_duration_secs)?;
                with_window(ledger, ac, id, Operation::SetRewardsManager, |ledger| {
                    ledger.set_rewards_manager(id, record.primary(), address)
                })?;
            }
            ComponentKind::ContextManager => {
                let approved_callers = ledger.access_controller(&ac)?.members(Role::ApprovedCaller);
                ledger.initialize(
                    id,
                    address,
                    ComponentInit::ContextManager {
                        access_controller: ac,
                        approved_callers,
                    },
                )?;
            }
            other => return Err(ValidationError::InvalidComponent(other).into()),
        }
        self.approve_caller(ledger, ac, address)?;

        let transition = staging.registry.mark_optional_component_done(primary, kind)?;
        if transition == CompletionTransition::BecameComplete {
            self.release(staging, primary, ac)?;
        }
        Ok(address)
    }

    /// Grants `component` `ApprovedCaller` on `ac` unless it already holds
    /// it.
    fn approve_caller(&self, ledger: &mut Ledger, ac: Address, component: Address) -> FactoryResult<()> {
        if ledger.access_controller(&ac)?.has_role(Role::ApprovedCaller, &component) {
            return Ok(());
        }
        let id = self.identity;
        with_window(
            ledger,
            ac,
            id,
            Operation::ManageRole(Role::ApprovedCaller),
            |ledger| ledger.grant_role(id, ac, Role::ApprovedCaller, component),
        )?;
        Ok(())
    }

    fn release(&self, staging: &mut FactoryState, primary: &Address, ac: Address) -> FactoryResult<()> {
        release_standing_capability(&mut staging.ledger, ac, self.identity)?;
        if let Some(record) = staging.registry.record_mut(primary) {
            record.provisioner_active = false;
        }
        Ok(())
    }

    /// Re-runs completion detection for `primary`. Releases the standing
    /// capability if the instance is complete and it is still held; returns
    /// whether it did. Never errors or revokes twice for a released
    /// instance.
    pub fn reconcile_capability(&self, primary: Address) -> FactoryResult<bool> {
        let mut state = self.state.write();
        let record = state
            .registry
            .record(&primary)
            .ok_or(StateError::NotRegistered(primary))?;
        let ac = record.addresses.access_controller;
        let complete = record.is_complete();

        let held = state
            .ledger
            .access_controller(&ac)?
            .has_role(Role::Provisioner, &self.identity);
        if !complete || !held {
            tracing::debug!(%primary, complete, held, "nothing to reconcile");
            return Ok(false);
        }

        let mut staged = Staged::begin(&mut state);
        self.release(&mut staged, &primary, ac)?;
        self.persist(&staged, self.sequence.current())?;
        staged.commit();
        Ok(true)
    }

    // -- Prediction ---------------------------------------------------------

    /// The six addresses `create_seeded(_, seed)` would produce.
    pub fn predict_addresses(&self, seed: &SeedValue) -> FactoryResult<InstanceAddresses> {
        self.predict_from(&explicit_master_seed(seed))
    }

    /// The six addresses the next `create_eager` would produce, absent
    /// concurrent creations.
    pub fn predict_next_addresses(&self) -> FactoryResult<InstanceAddresses> {
        self.predict_from(&auto_master_seed(self.sequence.peek()))
    }

    fn predict_from(&self, master: &MasterSeed) -> FactoryResult<InstanceAddresses> {
        let state = self.state.read();
        let templates = state.config.templates;
        for kind in ComponentKind::ALL {
            templates.require(kind)?;
        }
        Ok(InstanceAddresses::from_fn(|kind| {
            state
                .ledger
                .predict(self.identity, &derive_component_seed(master, kind), templates.get(kind))
        }))
    }

    // -- Administration -----------------------------------------------------

    /// Appends a fee package and returns its index.
    pub fn add_fee_package(&self, caller: Address, package: FeePackage) -> FactoryResult<usize> {
        self.administer(caller, |config, _| {
            package.validate()?;
            config.fee_packages.push(package);
            Ok(config.fee_packages.len() - 1)
        })
    }

    /// Replaces the fee package at `index`. Existing instances keep the
    /// values they copied.
    pub fn update_fee_package(&self, caller: Address, index: usize, package: FeePackage) -> FactoryResult<()> {
        self.administer(caller, |config, _| {
            package.validate()?;
            let len = config.fee_packages.len();
            let slot = config
                .fee_packages
                .get_mut(index)
                .ok_or(ValidationError::FeePackageOutOfRange { index, len })?;
            *slot = package;
            Ok(())
        })
    }

    /// Points `kind` at a published template. Seeded instances keep the
    /// deferred templates pinned at their creation.
    pub fn set_template(&self, caller: Address, kind: ComponentKind, template: Address) -> FactoryResult<()> {
        self.administer(caller, |config, ledger| {
            ledger.resolve_template(template, kind)?;
            config.templates.set(kind, template);
            Ok(())
        })
    }

    pub fn set_admins(&self, caller: Address, admins: Vec<Address>) -> FactoryResult<()> {
        self.administer(caller, |config, _| {
            config.admins = admins;
            Ok(())
        })
    }

    fn administer<T>(
        &self,
        caller: Address,
        f: impl FnOnce(&mut GlobalConfiguration, &Ledger) -> FactoryResult<T>,
    ) -> FactoryResult<T> {
        let mut state = self.state.write();
        if caller != state.config.owner {
            return Err(AuthorizationError::NotFactoryOwner(caller).into());
        }

        let mut config = state.config.clone();
        let out = f(&mut config, &state.ledger)?;
        config.validate()?;

        let previous = std::mem::replace(&mut state.config, config);
        if let Err(e) = self.persist(&state, self.sequence.current()) {
            state.config = previous;
            return Err(e);
        }
        Ok(out)
    }

    // -- External calls -----------------------------------------------------

    /// Runs a call against hosted components (an owner updating fees, an
    /// admin granting a role) as one atomic, persisted unit.
    pub fn call<T>(&self, f: impl FnOnce(&mut Ledger) -> FactoryResult<T>) -> FactoryResult<T> {
        let mut state = self.state.write();
        let mut staged = Staged::begin(&mut state);
        let out = f(&mut staged.ledger)?;
        self.persist(&staged, self.sequence.current())?;
        staged.commit();
        Ok(out)
    }

    // -- Accessors ----------------------------------------------------------

    pub fn identity(&self) -> Address {
        self.identity
    }

    pub fn config(&self) -> GlobalConfiguration {
        self.state.read().config.clone()
    }

    /// Read access to the hosted components.
    pub fn ledger(&self) -> MappedRwLockReadGuard<'_, Ledger> {
        RwLockReadGuard::map(self.state.read(), |state| &state.ledger)
    }

    pub fn instance(&self, primary: &Address) -> Option<InstanceRecord> {
        self.state.read().registry.record(primary).cloned()
    }

    pub fn instance_at(&self, index: u64) -> Option<InstanceRecord> {
        let state = self.state.read();
        let primary = state.registry.get_by_index(index);
        state.registry.record(&primary).cloned()
    }

    pub fn instance_state(&self, primary: &Address) -> FactoryResult<InstanceState> {
        self.state
            .read()
            .registry
            .record(primary)
            .map(InstanceRecord::state)
            .ok_or_else(|| StateError::NotRegistered(*primary).into())
    }

    pub fn instance_count(&self) -> usize {
        self.state.read().registry.len()
    }

    /// All records in index order.
    pub fn instances(&self) -> Vec<InstanceRecord> {
        self.state.read().registry.iter().cloned().collect()
    }

    /// The latest committed sequence index.
    pub fn latest_index(&self) -> u64 {
        self.sequence.current()
    }

    // -- Persistence --------------------------------------------------------

    /// Writes what the open run touched, plus the meta values.
    fn persist(&self, state: &FactoryState, latest_index: u64) -> FactoryResult<()> {
        let Some(db) = &self.store else {
            return Ok(());
        };
        db.commit(&Commit {
            identity: self.identity,
            config: &state.config,
            ledger: state.ledger.changes(),
            records: state.registry.changed(),
            latest_index,
        })?;
        Ok(())
    }
}
