//! Ephemeral multi-role ArangoDB clusters for integration tests.
//!
//! Provides cluster topology construction and lifecycle orchestration:
//! - Role catalog mapping agents, data servers and coordinators to commands
//! - Topology builder producing an immutable, role-indexed [`ClusterHandle`]
//! - Phased concurrent start and reverse-order stop over a [`NodeRuntime`]
//! - Layered TOML/env configuration and a Docker-backed runtime

pub mod config;
pub mod docker;
pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod loader;
pub mod node;
pub mod role;
pub mod runtime;
pub mod topology;

pub use config::{AuthMode, ClusterConfig, ClusterConfigBuilder, ClusterDefaults};
pub use docker::DockerRuntime;
pub use error::{Error, Result};
pub use handle::{ClusterHandle, HostAndPort};
pub use lifecycle::{ClusterState, LifecycleCoordinator, Phase};
pub use loader::ConfigLoader;
pub use node::{Node, NodeStatus};
pub use role::{CommandContext, Role, RoleCatalog};
pub use runtime::{NodeRuntime, READY_LOG_PATTERN, ReadyPattern, RuntimeError};
pub use topology::TopologyBuilder;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Writes a validated cluster configuration into `project_dir`.
pub fn init_cluster(project_dir: &Path, config: &ClusterConfig) -> Result<PathBuf> {
    config.validate()?;
    let path = ClusterConfig::path_in(project_dir);
    config.save(&path)?;
    Ok(path)
}

/// Builds the topology for `config` with the built-in defaults.
pub fn build_cluster(config: &ClusterConfig) -> Result<ClusterHandle> {
    TopologyBuilder::new(&ClusterDefaults::default()).build(config)
}

/// Starts `handle` on `runtime`, returning the coordinator that owns it.
///
/// On failure the nodes that did start are stopped before the error is
/// returned; stop failures are logged and dropped in favour of the start error.
pub async fn start_cluster(
    handle: &ClusterHandle,
    runtime: Arc<dyn NodeRuntime>,
    timeout: Duration,
) -> Result<LifecycleCoordinator> {
    let mut coordinator = LifecycleCoordinator::new(runtime);
    if let Err(e) = coordinator.start(handle, timeout).await {
        if let Err(stop_err) = coordinator.stop(handle, timeout).await {
            tracing::warn!(error = %stop_err, "cleanup after failed start incomplete");
        }
        return Err(e);
    }
    Ok(coordinator)
}

/// Stops a running cluster gracefully.
pub async fn stop_cluster(
    coordinator: &mut LifecycleCoordinator,
    handle: &ClusterHandle,
    timeout: Duration,
) -> Result<()> {
    coordinator.stop(handle, timeout).await
}
