//! Layered configuration loading.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. `~/.config/arango-testcluster/config.toml` (user defaults)
//! 3. `arango-cluster.toml` (project config)
//! 4. `arango-cluster.local.toml` (local overrides)
//! 5. Environment variables (`ARANGO_CLUSTER_*`, e.g. `ARANGO_CLUSTER_AGENT_COUNT=5`)

use std::env;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::debug;

use crate::config::{CONFIG_FILE_NAME, ClusterConfig, ClusterDefaults};
use crate::Result;

/// File name of the gitignored local override.
pub const LOCAL_CONFIG_FILE_NAME: &str = "arango-cluster.local.toml";

/// Configuration loader with builder pattern.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    defaults: ClusterDefaults,
    user_config: bool,
}

impl ConfigLoader {
    /// Creates a loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "ARANGO_CLUSTER".to_string(),
            defaults: ClusterDefaults::default(),
            user_config: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets the environment variable prefix (default: `ARANGO_CLUSTER`).
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn with_defaults(mut self, defaults: ClusterDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Skips the per-user config file.
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Path of the per-user config file, if the platform has one.
    pub fn user_config_file() -> Option<PathBuf> {
        ProjectDirs::from("io", "testcontainers", "arango-testcluster")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads configuration from all sources with proper precedence.
    pub fn load(self) -> Result<ClusterConfig> {
        let defaults = ClusterConfig::from_defaults(&self.defaults);
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&defaults)?);

        let mut files = Vec::new();
        if self.user_config {
            files.extend(Self::user_config_file());
        }
        files.push(self.project_dir.join(CONFIG_FILE_NAME));
        files.push(self.project_dir.join(LOCAL_CONFIG_FILE_NAME));

        for file in files {
            if file.exists() {
                debug!(path = %file.display(), "loading cluster config file");
                builder = builder.add_source(
                    config::File::from(file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("extra_args"),
        );

        let config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Loads configuration or returns defaults if loading fails.
    pub fn load_or_default(self) -> ClusterConfig {
        let defaults = ClusterConfig::from_defaults(&self.defaults);
        self.load().unwrap_or(defaults)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
