//! # FactoryDb — Durable Factory State
//!
//! Persists an orchestrator so it can be reopened with the same identity,
//! configuration, ledger, registry and sequence counter.
//!
//! ## Tree Layout
//!
//! | Tree              | Key                          | Value                     |
//! |-------------------|------------------------------|---------------------------|
//! | `instances`       | primary (20B)                | `bincode(InstanceRecord)` |
//! | `instance_index`  | `index` (8B BE)              | primary (20B)             |
//! | `implementations` | template (20B)               | `bincode(ComponentKind)`  |
//! | `deployments`     | address (20B)                | `bincode(Deployment)`     |
//! | `seeds`           | deployer (20B) ‖ seed (32B)  | empty                     |
//! | `meta`            | key (UTF-8)                  | bincode value             |
//!
//! Indices are stored big-endian so sled's byte order is index order.
//!
//! ## Atomicity
//!
//! Every orchestrator call ends in one [`FactoryDb::commit`], which writes
//! only the entries the call touched plus the small meta values, in a
//! single multi-tree transaction. A crash leaves either the old state or
//! the new one. Once that transaction has applied the commit counts as
//! done; a failing flush afterwards is logged, not reported.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;

use tessera_protocol::config::{ADDRESS_LENGTH, SEED_LENGTH};
use tessera_protocol::{Address, ComponentKind, ComponentSeed, FactoryError};

use crate::factory::config::GlobalConfiguration;
use crate::factory::registry::InstanceRecord;
use crate::ledger::{Deployment, Ledger, LedgerChanges};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(e: TransactionError<StoreError>) -> Self {
        match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => StoreError::Sled(inner),
        }
    }
}

impl From<StoreError> for FactoryError {
    fn from(e: StoreError) -> Self {
        FactoryError::Storage(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Meta Keys
// ---------------------------------------------------------------------------

const META_IDENTITY: &[u8] = b"identity";
const META_CONFIG: &[u8] = b"config";
const META_LATEST_INDEX: &[u8] = b"latest_index";

// ---------------------------------------------------------------------------
// Commit / Snapshot
// ---------------------------------------------------------------------------

/// Everything one orchestrator call writes.
pub struct Commit<'a> {
    pub identity: Address,
    pub config: &'a GlobalConfiguration,
    /// Ledger entries created or changed by the call.
    pub ledger: LedgerChanges<'a>,
    /// Records created or changed by the call.
    pub records: Vec<&'a InstanceRecord>,
    pub latest_index: u64,
}

/// A fully loaded factory.
#[derive(Debug, Clone)]
pub struct FactorySnapshot {
    pub identity: Address,
    pub config: GlobalConfiguration,
    pub ledger: Ledger,
    /// In index order.
    pub records: Vec<InstanceRecord>,
    pub latest_index: u64,
}

// ---------------------------------------------------------------------------
// FactoryDb
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FactoryDb {
    db: Db,
    instances: Tree,
    instance_index: Tree,
    implementations: Tree,
    deployments: Tree,
    seeds: Tree,
    meta: Tree,
}

impl FactoryDb {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// An in-memory store removed on drop.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        Ok(Self {
            instances: db.open_tree("instances")?,
            instance_index: db.open_tree("instance_index")?,
            implementations: db.open_tree("implementations")?,
            deployments: db.open_tree("deployments")?,
            seeds: db.open_tree("seeds")?,
            meta: db.open_tree("meta")?,
            db,
        })
    }

    /// `true` if no factory was ever committed here.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(!self.meta.contains_key(META_IDENTITY)?)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn deployment_count(&self) -> usize {
        self.deployments.len()
    }

    /// Writes `commit` atomically.
    pub fn commit(&self, commit: &Commit<'_>) -> StoreResult<()> {
        let identity = encode(&commit.identity)?;
        let config = encode(commit.config)?;
        let latest = encode(&commit.latest_index)?;
        let records = commit
            .records
            .iter()
            .map(|record| -> StoreResult<_> {
                Ok((record.index, record.primary(), encode(*record)?))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        let implementations = commit
            .ledger
            .implementations
            .iter()
            .map(|(at, kind)| -> StoreResult<_> { Ok((*at, encode(kind)?)) })
            .collect::<StoreResult<Vec<_>>>()?;
        let deployments = commit
            .ledger
            .deployments
            .iter()
            .map(|(at, deployment)| -> StoreResult<_> { Ok((*at, encode(*deployment)?)) })
            .collect::<StoreResult<Vec<_>>>()?;
        let seeds: Vec<Vec<u8>> = commit
            .ledger
            .seeds
            .iter()
            .map(|(deployer, seed)| seed_key(deployer, seed))
            .collect();

        (
            &self.instances,
            &self.instance_index,
            &self.implementations,
            &self.deployments,
            &self.seeds,
            &self.meta,
        )
            .transaction(
                |(instances, instance_index, implementations_tree, deployments_tree, seeds_tree, meta)| {
                    for (index, primary, bytes) in &records {
                        instances.insert(primary.as_bytes().as_slice(), bytes.as_slice())?;
                        instance_index
                            .insert(index.to_be_bytes().to_vec(), primary.as_bytes().as_slice())?;
                    }
                    for (at, bytes) in &implementations {
                        implementations_tree.insert(at.as_bytes().as_slice(), bytes.as_slice())?;
                    }
                    for (at, bytes) in &deployments {
                        deployments_tree.insert(at.as_bytes().as_slice(), bytes.as_slice())?;
                    }
                    for key in &seeds {
                        seeds_tree.insert(key.as_slice(), &[] as &[u8])?;
                    }
                    meta.insert(META_IDENTITY, identity.as_slice())?;
                    meta.insert(META_CONFIG, config.as_slice())?;
                    meta.insert(META_LATEST_INDEX, latest.as_slice())?;
                    Ok::<(), ConflictableTransactionError<StoreError>>(())
                },
            )?;

        settle_flush(self.db.flush());
        tracing::debug!(
            records = records.len(),
            deployments = deployments.len(),
            seeds = seeds.len(),
            latest_index = commit.latest_index,
            "factory state committed"
        );
        Ok(())
    }

    /// Loads the whole factory, or `None` for a fresh store.
    pub fn load(&self) -> StoreResult<Option<FactorySnapshot>> {
        let Some(identity) = self.get_meta::<Address>(META_IDENTITY)? else {
            return Ok(None);
        };
        let config = self
            .get_meta::<GlobalConfiguration>(META_CONFIG)?
            .ok_or_else(|| StoreError::Corrupt("missing config".into()))?;
        let latest_index = self.get_meta::<u64>(META_LATEST_INDEX)?.unwrap_or(0);

        let mut records = Vec::with_capacity(self.instance_index.len());
        for entry in self.instance_index.iter() {
            let (_, primary) = entry?;
            let bytes = self
                .instances
                .get(&primary)?
                .ok_or_else(|| StoreError::Corrupt("index entry without record".into()))?;
            records.push(decode::<InstanceRecord>(&bytes)?);
        }

        let mut implementations = Vec::with_capacity(self.implementations.len());
        for entry in self.implementations.iter() {
            let (key, bytes) = entry?;
            implementations.push((address_key(&key)?, decode::<ComponentKind>(&bytes)?));
        }

        let mut deployments = Vec::with_capacity(self.deployments.len());
        for entry in self.deployments.iter() {
            let (key, bytes) = entry?;
            deployments.push((address_key(&key)?, decode::<Deployment>(&bytes)?));
        }

        let mut seeds = Vec::with_capacity(self.seeds.len());
        for entry in self.seeds.iter() {
            let (key, _) = entry?;
            seeds.push(parse_seed_key(&key)?);
        }

        Ok(Some(FactorySnapshot {
            identity,
            config,
            ledger: Ledger::restore(implementations, deployments, seeds),
            records,
            latest_index,
        }))
    }

    fn get_meta<T: DeserializeOwned>(&self, key: &[u8]) -> StoreResult<Option<T>> {
        self.meta
            .get(key)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }
}

/// The transaction has applied by the time this runs, so the commit stands
/// whether or not the flush succeeds.
fn settle_flush(flushed: sled::Result<usize>) {
    if let Err(e) = flushed {
        tracing::warn!(error = %e, "flush after commit failed; sled will retry in the background");
    }
}

fn seed_key(deployer: &Address, seed: &ComponentSeed) -> Vec<u8> {
    let mut key = Vec::with_capacity(ADDRESS_LENGTH + SEED_LENGTH);
    key.extend_from_slice(deployer.as_bytes());
    key.extend_from_slice(seed.as_bytes());
    key
}

fn parse_seed_key(key: &[u8]) -> StoreResult<(Address, ComponentSeed)> {
    if key.len() != ADDRESS_LENGTH + SEED_LENGTH {
        return Err(StoreError::Corrupt(format!("seed key of {} bytes", key.len())));
    }
    let (deployer, seed) = key.split_at(ADDRESS_LENGTH);
    let seed: [u8; SEED_LENGTH] = seed
        .try_into()
        .map_err(|_| StoreError::Corrupt("seed key".into()))?;
    Ok((address_key(deployer)?, ComponentSeed::from_bytes(seed)))
}

fn address_key(key: &[u8]) -> StoreResult<Address> {
    let bytes: [u8; ADDRESS_LENGTH] = key
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("address key of {} bytes", key.len())))?;
    Ok(Address::from_bytes(bytes))
}

fn encode<T: Serialize + ?Sized>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::config::TemplateSet;
    use crate::factory::registry::InstanceAddresses;
    use tessera_protocol::seed::{auto_master_seed, derive_component_seed};

    fn config() -> GlobalConfiguration {
        GlobalConfiguration::new(Address::labelled("owner"), TemplateSet::labelled("store"))
    }

    fn record(index: u64, label: &str) -> InstanceRecord {
        InstanceRecord {
            index,
            addresses: InstanceAddresses {
                primary_container: Address::labelled(label),
                ..InstanceAddresses::default()
            },
            ..InstanceRecord::default()
        }
    }

    /// A ledger with one published template and one deployment from it.
    fn ledger() -> Ledger {
        let mut ledger = Ledger::new();
        let template = Address::labelled("pm-template");
        ledger
            .publish_implementation(template, ComponentKind::PriceManager)
            .unwrap();
        let seed = derive_component_seed(&auto_master_seed(1), ComponentKind::PriceManager);
        ledger
            .deploy(Address::labelled("factory"), &seed, ComponentKind::PriceManager, template)
            .unwrap();
        ledger
    }

    #[test]
    fn fresh_store_loads_nothing() {
        let db = FactoryDb::open_temporary().unwrap();
        assert!(db.is_empty().unwrap());
        assert!(db.load().unwrap().is_none());
    }

    #[test]
    fn commit_then_load() {
        let db = FactoryDb::open_temporary().unwrap();
        let config = config();
        let ledger = ledger();
        let (a, b) = (record(1, "a"), record(2, "b"));

        db.commit(&Commit {
            identity: Address::labelled("factory"),
            config: &config,
            ledger: ledger.snapshot(),
            records: vec![&b, &a],
            latest_index: 2,
        })
        .unwrap();

        let snapshot = db.load().unwrap().expect("snapshot");
        assert_eq!(snapshot.identity, Address::labelled("factory"));
        assert_eq!(snapshot.config, config);
        assert_eq!(snapshot.latest_index, 2);
        assert_eq!(snapshot.records, vec![a, b]);
        assert_eq!(snapshot.ledger, ledger);
        assert_eq!(db.instance_count(), 2);
        assert_eq!(db.deployment_count(), 1);
    }

    #[test]
    fn commits_merge_entry_by_entry() {
        let db = FactoryDb::open_temporary().unwrap();
        let config = config();
        let mut ledger = ledger();
        db.commit(&Commit {
            identity: Address::labelled("factory"),
            config: &config,
            ledger: ledger.snapshot(),
            records: vec![],
            latest_index: 0,
        })
        .unwrap();

        ledger.begin();
        let seed = derive_component_seed(&auto_master_seed(2), ComponentKind::PriceManager);
        ledger
            .deploy(
                Address::labelled("factory"),
                &seed,
                ComponentKind::PriceManager,
                Address::labelled("pm-template"),
            )
            .unwrap();
        let changes = ledger.changes();
        assert_eq!(changes.deployments.len(), 1);

        db.commit(&Commit {
            identity: Address::labelled("factory"),
            config: &config,
            ledger: changes,
            records: vec![],
            latest_index: 0,
        })
        .unwrap();
        ledger.commit_changes();

        assert_eq!(db.deployment_count(), 2);
        assert_eq!(db.load().unwrap().expect("snapshot").ledger, ledger);
    }

    #[test]
    fn failed_flush_does_not_undo_a_commit() {
        // Nothing to assert beyond not panicking: the outcome is a log line.
        settle_flush(Err(sled::Error::Unsupported("flush refused".into())));
        settle_flush(Ok(0));
    }

    #[test]
    fn malformed_keys_are_corrupt() {
        assert!(matches!(address_key(&[1, 2, 3]), Err(StoreError::Corrupt(_))));
        assert!(matches!(parse_seed_key(&[0u8; 20]), Err(StoreError::Corrupt(_))));

        let deployer = Address::labelled("factory");
        let seed = derive_component_seed(&auto_master_seed(3), ComponentKind::ContextManager);
        assert_eq!(
            parse_seed_key(&seed_key(&deployer, &seed)).unwrap(),
            (deployer, seed)
        );
    }

    #[test]
    fn reopen_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = FactoryDb::open(dir.path()).unwrap();
            db.commit(&Commit {
                identity: Address::labelled("factory"),
                config: &config(),
                ledger: Ledger::new().snapshot(),
                records: vec![&record(1, "a")],
                latest_index: 1,
            })
            .unwrap();
        }

        let db = FactoryDb::open(dir.path()).unwrap();
        let snapshot = db.load().unwrap().expect("snapshot");
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.latest_index, 1);
    }
}
