//! Cluster configuration management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::topology::TopologyBuilder;
use crate::{ClusterHandle, Error, Result};

/// File name of the project-level cluster configuration.
pub const CONFIG_FILE_NAME: &str = "arango-cluster.toml";

/// Upper bound on the node count of a single role.
pub const MAX_ROLE_NODES: usize = u16::MAX as usize;

/// Built-in values for every tunable of a cluster.
///
/// Passed explicitly into builders; there is no process-wide instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDefaults {
    pub agent_count: usize,
    pub data_server_count: usize,
    pub coordinator_count: usize,
    pub image: String,
    pub binary: String,
    /// Port every server listens on inside its network namespace.
    pub server_port: u16,
    pub agent_port_from: u16,
    pub data_server_port_from: u16,
    pub coordinator_port_from: u16,
    /// Host clients use to reach exposed coordinator ports.
    pub host: String,
    pub user: String,
    pub startup_timeout: Duration,
}

impl Default for ClusterDefaults {
    fn default() -> Self {
        Self {
            agent_count: 3,
            data_server_count: 2,
            coordinator_count: 2,
            image: "arangodb:latest".to_string(),
            binary: "arangod".to_string(),
            server_port: 8529,
            agent_port_from: 8500,
            data_server_port_from: 8515,
            coordinator_port_from: 8529,
            host: "localhost".to_string(),
            user: "root".to_string(),
            startup_timeout: Duration::from_secs(60),
        }
    }
}

/// Authentication applied to the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// Every node runs with authentication disabled.
    NoAuth,

    /// Coordinators require this root password.
    Password(String),

    /// Coordinators require a password generated at build time.
    RandomPassword,
}

/// Configuration for an ArangoDB test cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of agency nodes, leader included. Must be odd.
    pub agent_count: usize,

    /// Number of DBSERVER nodes.
    pub data_server_count: usize,

    /// Number of COORDINATOR nodes.
    pub coordinator_count: usize,

    /// Image reference every node runs.
    pub image: String,

    /// Root password for coordinators.
    pub password: Option<String>,

    /// Disable authentication on every node.
    pub no_auth: bool,

    /// Generate a root password for coordinators.
    pub random_password: bool,

    /// Publish agent ports on the host.
    pub expose_agents: bool,

    /// Publish data server ports on the host.
    pub expose_data_servers: bool,

    /// First host port for agents (agent N uses agent_port_from + N).
    pub agent_port_from: u16,

    /// First host port for data servers.
    pub data_server_port_from: u16,

    /// First host port for coordinators.
    pub coordinator_port_from: u16,

    /// Arguments appended to every node's command line.
    pub extra_args: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::from_defaults(&ClusterDefaults::default())
    }
}

impl ClusterConfig {
    /// Creates a configuration seeded from `defaults`.
    pub fn from_defaults(defaults: &ClusterDefaults) -> Self {
        Self {
            agent_count: defaults.agent_count,
            data_server_count: defaults.data_server_count,
            coordinator_count: defaults.coordinator_count,
            image: defaults.image.clone(),
            password: None,
            no_auth: false,
            random_password: false,
            expose_agents: false,
            expose_data_servers: false,
            agent_port_from: defaults.agent_port_from,
            data_server_port_from: defaults.data_server_port_from,
            coordinator_port_from: defaults.coordinator_port_from,
            extra_args: Vec::new(),
        }
    }

    /// Starts a builder seeded from the built-in defaults.
    pub fn builder() -> ClusterConfigBuilder {
        ClusterConfigBuilder::new(&ClusterDefaults::default())
    }

    /// Total number of nodes the configuration describes.
    pub fn node_count(&self) -> usize {
        self.agent_count
            .saturating_add(self.data_server_count)
            .saturating_add(self.coordinator_count)
    }

    /// Resolves the requested auth mode.
    ///
    /// At most one of `password`, `no_auth` and `random_password` may be set;
    /// when none is, the cluster runs without authentication.
    pub fn auth_mode(&self) -> Result<AuthMode> {
        let requested = usize::from(self.password.is_some())
            + usize::from(self.no_auth)
            + usize::from(self.random_password);
        if requested > 1 {
            return Err(Error::Configuration(
                "password, no-auth and random password are mutually exclusive".to_string(),
            ));
        }

        match &self.password {
            Some(password) if password.trim().is_empty() => Err(Error::Configuration(
                "password must not be blank".to_string(),
            )),
            Some(password) => Ok(AuthMode::Password(password.clone())),
            None if self.random_password => Ok(AuthMode::RandomPassword),
            None => Ok(AuthMode::NoAuth),
        }
    }

    /// Validates the cluster shape without building anything.
    pub fn validate(&self) -> Result<()> {
        if self.agent_count < 1 || self.agent_count % 2 == 0 {
            return Err(Error::Configuration(format!(
                "agent count must be odd and >= 1, got {}",
                self.agent_count
            )));
        }
        if self.data_server_count < 2 {
            return Err(Error::Configuration(format!(
                "data server count must be >= 2, got {}",
                self.data_server_count
            )));
        }
        if self.coordinator_count < 2 {
            return Err(Error::Configuration(format!(
                "coordinator count must be >= 2, got {}",
                self.coordinator_count
            )));
        }
        for (role, count) in [
            ("agent", self.agent_count),
            ("data server", self.data_server_count),
            ("coordinator", self.coordinator_count),
        ] {
            if count > MAX_ROLE_NODES {
                return Err(Error::Configuration(format!(
                    "{role} count must be <= {MAX_ROLE_NODES}, got {count}"
                )));
            }
        }
        if self.image.trim().is_empty() {
            return Err(Error::Configuration(
                "image reference must not be blank".to_string(),
            ));
        }

        // Host ports only exist for published roles.
        if self.expose_agents {
            check_port_range("agent", self.agent_port_from, self.agent_count)?;
        }
        if self.expose_data_servers {
            check_port_range(
                "data server",
                self.data_server_port_from,
                self.data_server_count,
            )?;
        }
        check_port_range(
            "coordinator",
            self.coordinator_port_from,
            self.coordinator_count,
        )?;

        self.auth_mode().map(|_| ())
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Default location of the configuration inside a project directory.
    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE_NAME)
    }
}

fn check_port_range(role: &str, from: u16, count: usize) -> Result<()> {
    let last = count
        .checked_sub(1)
        .and_then(|n| usize::from(from).checked_add(n));
    if from == 0 || last.is_none_or(|last| last > usize::from(u16::MAX)) {
        return Err(Error::Configuration(format!(
            "invalid {role} port range: from={from}, nodes={count}"
        )));
    }
    Ok(())
}

/// By-value builder for [`ClusterConfig`].
///
/// Auth setters only record the request; contradictions are reported by
/// [`ClusterConfigBuilder::build`].
#[derive(Debug, Clone)]
pub struct ClusterConfigBuilder {
    defaults: ClusterDefaults,
    config: ClusterConfig,
}

impl ClusterConfigBuilder {
    /// Creates a builder seeded from `defaults`.
    pub fn new(defaults: &ClusterDefaults) -> Self {
        Self {
            defaults: defaults.clone(),
            config: ClusterConfig::from_defaults(defaults),
        }
    }

    /// Starts from an existing configuration.
    pub fn from_config(defaults: &ClusterDefaults, config: ClusterConfig) -> Self {
        Self {
            defaults: defaults.clone(),
            config,
        }
    }

    pub fn with_agent_nodes(mut self, count: usize) -> Self {
        self.config.agent_count = count;
        self
    }

    pub fn with_data_server_nodes(mut self, count: usize) -> Self {
        self.config.data_server_count = count;
        self
    }

    pub fn with_coordinator_nodes(mut self, count: usize) -> Self {
        self.config.coordinator_count = count;
        self
    }

    /// Full image reference, e.g. `arangodb:3.11.2`.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.config.image = image.into();
        self
    }

    /// Image tag applied to the default `arangodb` repository.
    pub fn with_version(mut self, version: &str) -> Self {
        self.config.image = if version.trim().is_empty() {
            String::new()
        } else {
            format!("arangodb:{version}")
        };
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    pub fn with_random_password(mut self) -> Self {
        self.config.random_password = true;
        self
    }

    pub fn without_auth(mut self) -> Self {
        self.config.no_auth = true;
        self
    }

    /// Publish agent ports starting at the configured agent port base.
    pub fn with_exposed_agent_nodes(mut self) -> Self {
        self.config.expose_agents = true;
        self
    }

    /// Publish data server ports starting at the configured base.
    pub fn with_exposed_data_server_nodes(mut self) -> Self {
        self.config.expose_data_servers = true;
        self
    }

    pub fn with_agent_port_from(mut self, port: u16) -> Self {
        self.config.agent_port_from = port;
        self
    }

    pub fn with_data_server_port_from(mut self, port: u16) -> Self {
        self.config.data_server_port_from = port;
        self
    }

    pub fn with_coordinator_port_from(mut self, port: u16) -> Self {
        self.config.coordinator_port_from = port;
        self
    }

    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<ClusterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Validates the configuration and builds the topology.
    pub fn build_topology(self) -> Result<ClusterHandle> {
        TopologyBuilder::new(&self.defaults).build(&self.config)
    }
}
