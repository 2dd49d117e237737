//! Runs a cluster in Docker until interrupted.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arango_testcluster::{ClusterHandle, DockerRuntime, build_cluster, start_cluster, stop_cluster};
use tracing::warn;

use super::{ClusterArgs, resolve_config};

pub fn run(dir: &str, network: &str, timeout_secs: u64, args: &ClusterArgs) -> Result<()> {
    let config = resolve_config(dir, args)?;
    let handle = build_cluster(&config).context("Failed to build cluster topology")?;
    let timeout = Duration::from_secs(timeout_secs);

    println!(
        "Starting {}-node cluster from {} on network {network}...",
        handle.len(),
        Path::new(dir).display()
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    runtime.block_on(serve(&handle, network, timeout))
}

/// Starts the cluster, blocks until Ctrl+C, then tears everything down.
async fn serve(handle: &ClusterHandle, network: &str, timeout: Duration) -> Result<()> {
    let docker = Arc::new(DockerRuntime::new(network));
    docker
        .create_network()
        .await
        .with_context(|| format!("Failed to create network {network}"))?;

    let started = start_cluster(handle, docker.clone(), timeout).await;
    let mut coordinator = match started {
        Ok(coordinator) => coordinator,
        Err(e) => {
            if let Err(net_err) = docker.remove_network().await {
                warn!(error = %net_err, "network left behind");
            }
            return Err(e).context("Failed to start cluster");
        }
    };

    println!();
    println!("Cluster running.");
    for entry in handle.hosts_and_ports() {
        println!("  Coordinator → {entry}");
    }
    println!("  User: {}", handle.user());
    if let Ok(password) = handle.password() {
        println!("  Password: {password}");
    }
    println!();
    println!("Press Ctrl+C to stop all nodes.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!("Stopping cluster...");
    let stopped = stop_cluster(&mut coordinator, handle, timeout).await;
    if let Err(e) = docker.remove_network().await {
        warn!(error = %e, "network left behind");
    }
    stopped.context("Failed to stop cluster cleanly")?;

    println!("Cluster stopped.");
    Ok(())
}
