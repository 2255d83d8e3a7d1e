// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tessera CLI
//!
//! Drives a persistent provisioning factory from the command line.
//!
//! ## Subcommands
//!
//! - `init`     — bootstrap a factory from a JSON configuration
//! - `predict`  — predict the addresses of a future instance
//! - `create`   — create an instance (eager, or seeded with `--seed`)
//! - `complete` — deploy one deferred component of a seeded instance
//! - `show`     — show one instance by primary address or index
//! - `list`     — list every instance
//! - `version`  — print version information

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use cli::{Commands, CompleteArgs, CreateArgs, InitArgs, PredictArgs, ShowArgs, TesseraCli};
use logging::LogFormat;
use tessera_contracts::components::AssetMetadata;
use tessera_contracts::{
    CreateRequest, FactoryDb, GlobalConfiguration, InstanceRecord, Ledger, Orchestrator,
};
use tessera_protocol::{Address, ComponentKind};

/// On-disk bootstrap file read by `tessera init`.
#[derive(Debug, Serialize, Deserialize)]
struct FactoryFile {
    /// Address the orchestrator deploys and calls as.
    identity: Address,
    factory: GlobalConfiguration,
}

fn main() -> Result<()> {
    let cli = TesseraCli::parse();

    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&cli.log_format),
    );

    match cli.command {
        Commands::Init(args) => init_factory(&cli.data_dir, args),
        Commands::Predict(args) => predict(&cli.data_dir, args),
        Commands::Create(args) => create(&cli.data_dir, args),
        Commands::Complete(args) => complete(&cli.data_dir, args),
        Commands::Show(args) => show(&cli.data_dir, args),
        Commands::List => list(&cli.data_dir),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn init_factory(data_dir: &Path, args: InitArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read config file: {}", args.config.display()))?;
    let file: FactoryFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file: {}", args.config.display()))?;

    let db = FactoryDb::open(data_dir)
        .with_context(|| format!("failed to open store at {}", data_dir.display()))?;
    if !db.is_empty()? {
        bail!("a factory already exists in {}", data_dir.display());
    }

    // A fresh world hosts exactly the configured templates.
    let mut ledger = Ledger::new();
    for kind in ComponentKind::ALL {
        let template = file.factory.templates.get(kind);
        if !template.is_zero() {
            ledger
                .publish_implementation(template, kind)
                .with_context(|| format!("failed to publish {kind} implementation"))?;
        }
    }

    let orchestrator = Orchestrator::new(file.identity, file.factory, ledger)
        .context("invalid factory configuration")?
        .attach_store(db)
        .context("failed to write factory to store")?;

    tracing::info!(
        data_dir = %data_dir.display(),
        identity = %orchestrator.identity(),
        "factory initialized"
    );
    print_json(&serde_json::json!({
        "identity": orchestrator.identity(),
        "config": orchestrator.config(),
    }))
}

fn predict(data_dir: &Path, args: PredictArgs) -> Result<()> {
    let orchestrator = open_factory(data_dir)?;
    let addresses = match args.seed {
        Some(seed) => orchestrator.predict_addresses(&seed)?,
        None => orchestrator.predict_next_addresses()?,
    };
    print_json(&addresses)
}

fn create(data_dir: &Path, args: CreateArgs) -> Result<()> {
    let orchestrator = open_factory(data_dir)?;
    let request = CreateRequest {
        metadata: AssetMetadata::new(args.name, args.symbol),
        asset: args.asset,
        owner: args.owner,
        with_admin: args.with_admin,
        fee_package: args.fee_package,
    };

    let record = match args.seed {
        Some(seed) => orchestrator.create_seeded(request, seed),
        None => orchestrator.create_eager(request),
    }
    .context("instance creation failed")?;

    print_record(&record)
}

fn complete(data_dir: &Path, args: CompleteArgs) -> Result<()> {
    let orchestrator = open_factory(data_dir)?;
    orchestrator
        .deploy_deferred_component(args.primary, args.component)
        .with_context(|| format!("failed to deploy {} for {}", args.component, args.primary))?;

    let record = orchestrator
        .instance(&args.primary)
        .with_context(|| format!("instance {} vanished after completion", args.primary))?;
    print_record(&record)
}

fn show(data_dir: &Path, args: ShowArgs) -> Result<()> {
    let orchestrator = open_factory(data_dir)?;
    let record = match (args.primary, args.index) {
        (Some(primary), _) => orchestrator
            .instance(&primary)
            .with_context(|| format!("no instance with primary address {primary}"))?,
        (None, Some(index)) => orchestrator
            .instance_at(index)
            .with_context(|| format!("no instance at index {index}"))?,
        (None, None) => bail!("either --primary or --index is required"),
    };
    print_record(&record)
}

fn list(data_dir: &Path) -> Result<()> {
    let orchestrator = open_factory(data_dir)?;
    let summaries: Vec<_> = orchestrator
        .instances()
        .iter()
        .map(|record| {
            serde_json::json!({
                "index": record.index,
                "primary": record.primary(),
                "state": record.state(),
                "symbol": record.metadata.symbol,
            })
        })
        .collect();
    print_json(&summaries)
}

fn open_factory(data_dir: &Path) -> Result<Orchestrator> {
    let db = FactoryDb::open(data_dir)
        .with_context(|| format!("failed to open store at {}", data_dir.display()))?;
    Orchestrator::open(db).with_context(|| {
        format!(
            "no factory in {}; run `tessera init` first",
            data_dir.display()
        )
    })
}

fn print_record(record: &InstanceRecord) -> Result<()> {
    let mut value = serde_json::to_value(record)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("state".into(), serde_json::to_value(record.state())?);
    }
    print_json(&value)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn print_version() {
    println!("tessera {}", env!("CARGO_PKG_VERSION"));
    println!("  protocol:  tessera-protocol");
    println!("  contracts: tessera-contracts");
    println!("  storage:   sled");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_contracts::{FeePackage, TemplateSet};

    #[test]
    fn factory_file_parses_with_defaults() {
        let owner = Address::labelled("owner");
        let recipient = Address::labelled("recipient");
        let file = FactoryFile {
            identity: Address::labelled("factory"),
            factory: GlobalConfiguration::new(owner, TemplateSet::labelled("cli-test"))
                .with_fee_package(FeePackage {
                    management_fee_bps: 100,
                    performance_fee_bps: 1_000,
                    recipient,
                }),
        };
        let json = serde_json::to_string(&file).unwrap();
        let parsed: FactoryFile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.identity, file.identity);
        assert_eq!(parsed.factory, file.factory);
    }

    #[test]
    fn init_then_create_round_trips_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("factory.json");
        let data_dir = dir.path().join("data");

        let owner = Address::labelled("owner");
        let file = FactoryFile {
            identity: Address::labelled("factory"),
            factory: GlobalConfiguration::new(owner, TemplateSet::labelled("cli-test"))
                .with_fee_package(FeePackage {
                    management_fee_bps: 0,
                    performance_fee_bps: 0,
                    recipient: Address::labelled("recipient"),
                }),
        };
        fs::write(&config_path, serde_json::to_string(&file).unwrap()).unwrap();

        init_factory(&data_dir, InitArgs { config: config_path.clone() }).unwrap();
        assert!(init_factory(&data_dir, InitArgs { config: config_path }).is_err());

        create(
            &data_dir,
            CreateArgs {
                name: "Vault".into(),
                symbol: "VLT".into(),
                asset: Address::labelled("asset"),
                owner,
                with_admin: false,
                fee_package: 0,
                seed: None,
            },
        )
        .unwrap();

        let orchestrator = open_factory(&data_dir).unwrap();
        assert_eq!(orchestrator.instance_count(), 1);
        let record = orchestrator.instance_at(1).unwrap();
        assert!(record.is_complete());
    }
}
