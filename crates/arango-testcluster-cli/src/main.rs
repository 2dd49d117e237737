//! `arango-testcluster` command-line tool.
//!
//! # Quick Start
//!
//! ```bash
//! # Write arango-cluster.toml into the current directory
//! arango-testcluster init --coordinators 3 --password secret
//!
//! # Show the nodes that would be created
//! arango-testcluster plan
//!
//! # Run the cluster in Docker until Ctrl+C
//! arango-testcluster up
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::ClusterArgs;

/// Plan and run multi-role ArangoDB clusters for integration tests.
#[derive(Parser)]
#[command(name = "arango-testcluster")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a cluster configuration file.
    Init {
        /// Project directory to write arango-cluster.toml into.
        #[arg(short, long, default_value = ".")]
        dir: String,

        /// Overwrite an existing configuration.
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Show the topology without starting anything.
    Plan {
        /// Project directory holding arango-cluster.toml.
        #[arg(short, long, default_value = ".")]
        dir: String,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Start the cluster in Docker and stop it on Ctrl+C.
    Up {
        /// Project directory holding arango-cluster.toml.
        #[arg(short, long, default_value = ".")]
        dir: String,

        /// Docker network created for the cluster.
        #[arg(short, long, default_value = "arango-testcluster")]
        network: String,

        /// Seconds each start or stop phase may take.
        #[arg(short, long, default_value = "60")]
        timeout: u64,

        #[command(flatten)]
        cluster: ClusterArgs,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so `plan --json` output stays parseable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            dir,
            force,
            cluster,
        } => commands::init::run(&dir, force, &cluster),
        Commands::Plan { dir, json, cluster } => commands::plan::run(&dir, json, &cluster),
        Commands::Up {
            dir,
            network,
            timeout,
            cluster,
        } => commands::up::run(&dir, &network, timeout, &cluster),
    }
}
