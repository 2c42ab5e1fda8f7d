//! Weave daemon: entry point for running a weave node.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use weave_dag::GenesisConfig;
use weave_node::{
    init_logging, IsolatedSync, LocalTxPool, NodeConfig, ShutdownController, WeaveNode,
};
use weave_types::Address;

/// Transactions held by the daemon's local pool.
const LOCAL_POOL_SIZE: usize = 10_000;

#[derive(Parser)]
#[command(name = "weave", about = "Weave DAG ledger node daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// flags and env vars override them.
    #[arg(long, env = "WEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node until SIGINT or SIGTERM.
    Run {
        /// Genesis document (overrides `genesis_path`).
        #[arg(long, env = "WEAVE_GENESIS")]
        genesis: Option<PathBuf>,

        /// Hex ed25519 seed of the local mediator; enables authoring.
        #[arg(long, env = "WEAVE_MEDIATOR_SEED", hide_env_values = true)]
        mediator_seed: Option<String>,

        /// Log level: "trace", "debug", "info", "warn", "error".
        #[arg(long, env = "WEAVE_LOG_LEVEL")]
        log_level: Option<String>,

        /// Log format: "human" or "json".
        #[arg(long, env = "WEAVE_LOG_FORMAT")]
        log_format: Option<String>,

        /// Disable the Prometheus registry.
        #[arg(long, env = "WEAVE_DISABLE_METRICS")]
        disable_metrics: bool,
    },

    /// Write a genesis document with default parameters.
    #[command(name = "create-genesis-json")]
    CreateGenesisJson {
        /// Output path.
        #[arg(default_value = "./genesis.json")]
        path: PathBuf,

        /// Token holder, also used as every initial mediator candidate
        /// unless `--mediator` is given.
        #[arg(long)]
        account: String,

        /// Initial mediator candidate (repeatable).
        #[arg(long = "mediator")]
        mediators: Vec<String>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => NodeConfig::default(),
    };

    match cli.command {
        Command::Run {
            genesis,
            mediator_seed,
            log_level,
            log_format,
            disable_metrics,
        } => {
            let config = NodeConfig {
                genesis_path: genesis.unwrap_or(file_config.genesis_path.clone()),
                mediator_seed: mediator_seed.or(file_config.mediator_seed.clone()),
                log_level: log_level.unwrap_or(file_config.log_level.clone()),
                log_format: log_format.unwrap_or(file_config.log_format.clone()),
                enable_metrics: file_config.enable_metrics && !disable_metrics,
                ..file_config
            };
            config.validate()?;
            init_logging(config.log_format()?, &config.log_level)?;
            run(config).await
        }
        Command::CreateGenesisJson {
            path,
            account,
            mediators,
            force,
        } => {
            init_logging(file_config.log_format()?, &file_config.log_level)?;
            create_genesis_json(path, &account, mediators, force)
        }
    }
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    tracing::info!(
        genesis = %config.genesis_path.display(),
        authoring = config.mediator_seed.is_some(),
        metrics = config.enable_metrics,
        "starting weave node"
    );

    let node = WeaveNode::load(
        config,
        Arc::new(IsolatedSync::new()),
        Arc::new(LocalTxPool::new(LOCAL_POOL_SIZE)),
    )?;
    node.start()?;

    ShutdownController::new().wait_for_signal().await;

    tracing::info!("shutdown signal received, stopping node");
    node.stop().await;
    if let Some(metrics) = node.metrics() {
        tracing::debug!(metrics = %metrics.gather_text()?, "final metrics");
    }
    tracing::info!(
        units = node.resolver().unit_count(),
        "weave daemon exited cleanly"
    );
    Ok(())
}

fn create_genesis_json(
    path: PathBuf,
    account: &str,
    mediators: Vec<String>,
    force: bool,
) -> anyhow::Result<()> {
    Address::parse(account).with_context(|| format!("--account {account:?}"))?;
    if path.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }

    let mut genesis = GenesisConfig::example(account);
    if !mediators.is_empty() {
        genesis.initial_active_mediators = mediators.len();
        genesis.initial_mediator_candidates = mediators;
    }
    genesis.validate()?;

    std::fs::write(&path, genesis.to_json_pretty())
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        mediators = genesis.initial_active_mediators,
        "genesis document written"
    );
    Ok(())
}
