//! # CLI Interface
//!
//! Command-line structure of `tessera`, defined with `clap` derive.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use tessera_protocol::{Address, ComponentKind, SeedValue};

/// Deterministic multi-component provisioning factory.
///
/// Keeps a factory (configuration, hosted components, instance registry)
/// in a sled store under the data directory. Every command prints its
/// result as JSON on stdout.
#[derive(Parser, Debug)]
#[command(
    name = "tessera",
    about = "Deterministic multi-component provisioning factory",
    version,
    propagate_version = true
)]
pub struct TesseraCli {
    /// Directory holding the factory store.
    #[arg(
        long,
        short = 'd',
        global = true,
        env = "TESSERA_DATA_DIR",
        default_value = ".tessera"
    )]
    pub data_dir: PathBuf,

    /// Log format: "pretty" or "json".
    #[arg(long, global = true, env = "TESSERA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bootstrap a factory from a JSON configuration file.
    Init(InitArgs),
    /// Predict the six addresses of a future instance.
    Predict(PredictArgs),
    /// Create an instance: eager by default, seeded with `--seed`.
    Create(CreateArgs),
    /// Deploy one deferred component of a seeded instance.
    Complete(CompleteArgs),
    /// Show one instance.
    Show(ShowArgs),
    /// List all instances in index order.
    List,
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to the factory configuration (JSON).
    #[arg(long, short = 'c', env = "TESSERA_CONFIG")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Explicit seed (32-byte hex). Without it, predicts the next eager
    /// instance.
    #[arg(long)]
    pub seed: Option<SeedValue>,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Asset share name.
    #[arg(long)]
    pub name: String,

    /// Asset share symbol.
    #[arg(long)]
    pub symbol: String,

    /// Address of the underlying asset.
    #[arg(long)]
    pub asset: Address,

    /// Owner of the new instance.
    #[arg(long)]
    pub owner: Address,

    /// Grant the factory's admins `Admin` on the instance.
    #[arg(long)]
    pub with_admin: bool,

    /// Fee package index.
    #[arg(long, default_value_t = 0)]
    pub fee_package: usize,

    /// Explicit seed (32-byte hex). Creates a seeded instance whose
    /// deferred components are deployed later with `complete`.
    #[arg(long)]
    pub seed: Option<SeedValue>,
}

#[derive(Args, Debug)]
pub struct CompleteArgs {
    /// Primary address of the instance.
    #[arg(long)]
    pub primary: Address,

    /// "rewards-manager" or "context-manager".
    #[arg(long)]
    pub component: ComponentKind,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ShowArgs {
    /// Primary address of the instance.
    #[arg(long)]
    pub primary: Option<Address>,

    /// Sequence index of the instance.
    #[arg(long)]
    pub index: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        TesseraCli::command().debug_assert();
    }

    #[test]
    fn parses_seeded_create() {
        let owner = Address::labelled("owner");
        let asset = Address::labelled("asset");
        let cli = TesseraCli::try_parse_from([
            "tessera".to_string(),
            "create".into(),
            "--name".into(),
            "Vault".into(),
            "--symbol".into(),
            "VLT".into(),
            "--asset".into(),
            asset.to_hex(),
            "--owner".into(),
            owner.to_hex(),
            "--seed".into(),
            format!("0x{}", "2a".repeat(32)),
        ])
        .unwrap();

        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.owner, owner);
                assert_eq!(args.fee_package, 0);
                assert!(args.seed.is_some());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_component_kind() {
        let cli = TesseraCli::try_parse_from([
            "tessera".to_string(),
            "complete".into(),
            "--primary".into(),
            Address::labelled("p").to_hex(),
            "--component".into(),
            "context-manager".into(),
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Complete(CompleteArgs {
                component: ComponentKind::ContextManager,
                ..
            })
        ));
    }
}
