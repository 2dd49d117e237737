//! CLI command implementations.

pub mod init;
pub mod plan;
pub mod up;

use std::path::Path;

use anyhow::{Context, Result};
use arango_testcluster::{ClusterConfig, ConfigLoader};
use clap::Args;

/// Cluster shape and auth flags shared by every command.
///
/// Flags override values loaded from files and the environment.
#[derive(Args, Debug, Default)]
pub struct ClusterArgs {
    /// Number of agency nodes (odd).
    #[arg(long)]
    pub agents: Option<usize>,

    /// Number of data server nodes.
    #[arg(long)]
    pub data_servers: Option<usize>,

    /// Number of coordinator nodes.
    #[arg(long)]
    pub coordinators: Option<usize>,

    /// Full image reference.
    #[arg(long, conflicts_with = "server_version")]
    pub image: Option<String>,

    /// Tag of the arangodb image.
    #[arg(long = "server-version")]
    pub server_version: Option<String>,

    /// Root password for coordinators.
    #[arg(long, conflicts_with_all = ["random_password", "no_auth"])]
    pub password: Option<String>,

    /// Generate a root password for coordinators.
    #[arg(long, conflicts_with = "no_auth")]
    pub random_password: bool,

    /// Disable authentication.
    #[arg(long)]
    pub no_auth: bool,

    /// Publish agent ports on the host.
    #[arg(long)]
    pub expose_agents: bool,

    /// Publish data server ports on the host.
    #[arg(long)]
    pub expose_data_servers: bool,

    /// Ignore the per-user config file.
    #[arg(long)]
    pub no_user_config: bool,
}

impl ClusterArgs {
    /// Applies the flags on top of `config`.
    pub fn apply(&self, config: &mut ClusterConfig) {
        if let Some(n) = self.agents {
            config.agent_count = n;
        }
        if let Some(n) = self.data_servers {
            config.data_server_count = n;
        }
        if let Some(n) = self.coordinators {
            config.coordinator_count = n;
        }
        if let Some(image) = &self.image {
            config.image.clone_from(image);
        }
        if let Some(version) = &self.server_version {
            config.image = format!("arangodb:{version}");
        }

        // Any auth flag replaces the auth settings from files.
        if self.password.is_some() || self.random_password || self.no_auth {
            config.password.clone_from(&self.password);
            config.random_password = self.random_password;
            config.no_auth = self.no_auth;
        }

        config.expose_agents |= self.expose_agents;
        config.expose_data_servers |= self.expose_data_servers;
    }
}

/// Loads layered configuration from `dir` and applies `args`.
pub fn resolve_config(dir: &str, args: &ClusterArgs) -> Result<ClusterConfig> {
    let mut loader = ConfigLoader::new().with_project_dir(Path::new(dir));
    if args.no_user_config {
        loader = loader.without_user_config();
    }
    let mut config = loader
        .load()
        .with_context(|| format!("Failed to load cluster configuration from {dir}"))?;
    args.apply(&mut config);
    config.validate().context("Invalid cluster configuration")?;
    Ok(config)
}
