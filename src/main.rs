//! Command-line interface for sync-testkit
//!
//! # Usage Examples
//!
//! ## Configuration
//! ```bash
//! # Mode and bucket set selected by a gateway configuration
//! sync-testkit config inspect sync_gateway_default_di.json
//! ```
//!
//! ## Cluster
//! ```bash
//! # Check the gateways (and accels in distributed index mode)
//! sync-testkit cluster check --topology cluster.json --config sync_gateway_default_cc.json
//!
//! # Reset the cluster through ansible, then check it
//! sync-testkit cluster reset --topology cluster.json --config sync_gateway_default_cc.json \
//!   --inventory provisioning/hosts
//! ```
//!
//! ## Scenarios
//! ```bash
//! sync-testkit scenario convergence --admin-url http://127.0.0.1:4985 --public-url http://127.0.0.1:4984
//! sync-testkit scenario sentinel --feed continuous --num-docs 10 --delay 5s
//! sync-testkit scenario bulk-users --prefix dj --count 10
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sync_testkit::cluster::{Cluster, ClusterFacade, CommandProvisioner};
use sync_testkit::config::{parse_duration, ClusterTopology, GatewayConfig, SessionSettings};
use sync_testkit::scenarios::{self, ConvergenceCounts, ScenarioOptions, TrackingFeed};
use sync_testkit::GatewayOpts;

#[derive(Parser)]
#[command(name = "sync-testkit")]
#[command(about = "Drive and verify multi-user scenarios against a document sync gateway")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect gateway configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Manage and check the cluster under test
    Cluster {
        #[command(subcommand)]
        command: ClusterCommand,
    },

    /// Run a scenario against a live gateway
    Scenario {
        #[command(subcommand)]
        scenario: ScenarioCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the cluster mode and bucket set of a configuration
    Inspect {
        /// Gateway configuration file
        path: PathBuf,
    },
}

#[derive(Parser, Clone)]
struct ClusterArgs {
    /// Cluster topology file
    #[arg(long, env = "SG_TOPOLOGY")]
    topology: PathBuf,

    /// Gateway configuration the cluster runs
    #[arg(long, env = "SG_CONFIG")]
    config: PathBuf,

    /// Per-node check timeout ("10s", "500ms", ...)
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    timeout: Duration,
}

#[derive(Subcommand)]
enum ClusterCommand {
    /// Check every node that should be running
    Check {
        #[command(flatten)]
        args: ClusterArgs,
    },

    /// Reset the cluster with the configuration, then check it
    Reset {
        #[command(flatten)]
        args: ClusterArgs,

        /// Ansible inventory describing the cluster hosts
        #[arg(long, env = "SG_INVENTORY")]
        inventory: String,
    },
}

#[derive(Parser, Clone)]
struct ScenarioArgs {
    #[command(flatten)]
    gateway: GatewayOpts,

    /// Password of every registered user
    #[arg(long, default_value = "password")]
    password: String,

    /// Pause after the workload before verifying ("1s", "500ms", ...)
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    settle: Duration,
}

impl ScenarioArgs {
    fn options(&self) -> ScenarioOptions {
        ScenarioOptions::new(&self.gateway.db)
            .with_password(&self.password)
            .with_settle(self.settle)
    }
}

#[derive(Subcommand)]
enum ScenarioCommand {
    /// Three users with overlapping channels converge
    Convergence {
        #[command(flatten)]
        args: ScenarioArgs,

        #[arg(long, default_value = "1000")]
        seth_docs: usize,

        #[arg(long, default_value = "2000")]
        adam_docs: usize,

        #[arg(long, default_value = "3000")]
        traun_docs: usize,

        /// Revisions applied to every document after insertion
        #[arg(long, default_value = "0")]
        revisions: usize,
    },

    /// A tracking session ends exactly on its termination document
    Sentinel {
        #[command(flatten)]
        args: ScenarioArgs,

        #[arg(long, value_enum, default_value = "continuous")]
        feed: TrackingFeed,

        #[arg(long, default_value = "10")]
        num_docs: usize,

        /// Pause between the last push and the termination document
        #[arg(long, default_value = "5s", value_parser = parse_duration)]
        delay: Duration,
    },

    /// Bulk-registered users inherit their role's channels
    BulkUsers {
        #[command(flatten)]
        args: ScenarioArgs,

        #[arg(long, default_value = "dj")]
        prefix: String,

        #[arg(long, default_value = "10")]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config {
            command: ConfigCommand::Inspect { path },
        } => inspect_config(path),
        Commands::Cluster { command } => run_cluster(command).await,
        Commands::Scenario { scenario } => run_scenario(scenario).await,
    }
}

fn inspect_config(path: PathBuf) -> anyhow::Result<()> {
    let config = GatewayConfig::from_file(&path)
        .with_context(|| format!("Failed to load gateway config from {path:?}"))?;
    println!("mode: {}", config.mode());
    if let Some(bucket) = config.cluster_bucket() {
        println!("cluster bucket: {bucket}");
    }
    for name in config.database_names() {
        println!("database: {name}");
    }
    println!("buckets: {}", config.bucket_names().join(", "));
    Ok(())
}

async fn run_cluster(command: ClusterCommand) -> anyhow::Result<()> {
    let (args, inventory) = match command {
        ClusterCommand::Check { args } => (args, None),
        ClusterCommand::Reset { args, inventory } => (args, Some(inventory)),
    };
    let topology = ClusterTopology::from_file(&args.topology)
        .with_context(|| format!("Failed to load topology from {:?}", args.topology))?;
    let settings = SessionSettings::default().with_request_timeout(args.timeout);
    let provisioner = Arc::new(CommandProvisioner::ansible(inventory.clone().unwrap_or_default()));
    let mut cluster = Cluster::new(&topology, settings, provisioner);

    let mode = match inventory {
        Some(_) => cluster
            .reset(&args.config)
            .await
            .context("Cluster reset failed")?,
        None => GatewayConfig::from_file(&args.config)
            .with_context(|| format!("Failed to load gateway config from {:?}", args.config))?
            .mode(),
    };

    let errors = cluster.verify_alive(mode).await;
    if errors.is_empty() {
        println!(
            "{} gateways, {} accels up ({mode})",
            cluster.sync_gateways().len(),
            if mode.is_distributed_index() { cluster.sg_accels().len() } else { 0 }
        );
        return Ok(());
    }
    for (node, error) in &errors {
        eprintln!("{node}: {error}");
    }
    anyhow::bail!("{} nodes are down", errors.len())
}

async fn run_scenario(scenario: ScenarioCommand) -> anyhow::Result<()> {
    match scenario {
        ScenarioCommand::Convergence {
            args,
            seth_docs,
            adam_docs,
            traun_docs,
            revisions,
        } => {
            let session = args.gateway.session()?;
            let counts = ConvergenceCounts {
                seth: seth_docs,
                adam: adam_docs,
                traun: traun_docs,
                revisions,
            };
            let report = scenarios::convergence(&session, &args.options(), counts).await?;
            println!("{}", report.summary());
        }
        ScenarioCommand::Sentinel {
            args,
            feed,
            num_docs,
            delay,
        } => {
            let session = args.gateway.session()?;
            let outcome = scenarios::sentinel_termination(
                &session,
                &args.options(),
                feed,
                num_docs,
                delay,
            )
            .await?;
            println!("{}", outcome.report.summary());
        }
        ScenarioCommand::BulkUsers {
            args,
            prefix,
            count,
        } => {
            let session = args.gateway.session()?;
            let outcome = scenarios::bulk_users(&session, &args.options(), &prefix, count).await?;
            println!("{}", outcome.report.summary());
        }
    }
    Ok(())
}
