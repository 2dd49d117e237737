//! [`NodeRuntime`] backed by the `docker` command-line client.
//!
//! Every node becomes one detached container on a per-cluster bridge network,
//! reachable from its peers under its alias.

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use crate::runtime::{NodeRuntime, ReadyPattern, RuntimeError};
use crate::Node;

/// Runs cluster nodes as Docker containers.
#[derive(Debug)]
pub struct DockerRuntime {
    docker: String,
    network: String,
    containers: Mutex<HashMap<String, String>>,
}

impl DockerRuntime {
    /// Creates a runtime placing containers on `network`.
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            docker: "docker".to_string(),
            network: network.into(),
            containers: Mutex::new(HashMap::new()),
        }
    }

    /// Uses a different client binary, e.g. `podman`.
    pub fn with_client(mut self, binary: impl Into<String>) -> Self {
        self.docker = binary.into();
        self
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Creates the bridge network nodes are attached to.
    pub async fn create_network(&self) -> Result<(), RuntimeError> {
        self.run(&["network", "create", self.network.as_str()]).await?;
        info!(network = %self.network, "created network");
        Ok(())
    }

    /// Removes the bridge network. Containers must be gone first.
    pub async fn remove_network(&self) -> Result<(), RuntimeError> {
        self.run(&["network", "rm", self.network.as_str()]).await?;
        info!(network = %self.network, "removed network");
        Ok(())
    }

    /// Container name used for `node`.
    pub fn container_name(&self, node: &Node) -> String {
        format!("{}-{}", self.network, node.alias())
    }

    /// Arguments of the `docker run` invocation for `node`.
    pub fn run_args(&self, node: &Node) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.container_name(node),
            "--network".to_string(),
            self.network.clone(),
            "--network-alias".to_string(),
            node.alias().to_string(),
        ];
        if let Some(port) = node.exposed_port() {
            args.push("-p".to_string());
            args.push(format!("{port}:{}", node.server_port()));
        }
        for (key, value) in node.env() {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(node.image().to_string());
        args.extend(node.command().iter().cloned());
        args
    }

    async fn container_id(&self, node: &Node) -> Result<String, RuntimeError> {
        self.containers
            .lock()
            .await
            .get(node.alias())
            .cloned()
            .ok_or(RuntimeError::NotStarted)
    }

    /// Runs a client command to completion and returns its stdout.
    async fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<String, RuntimeError> {
        let output = Command::new(&self.docker)
            .args(args.iter().map(|a| a.as_ref()))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RuntimeError::Spawn(format!("{}: {e}", self.docker)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let first = args.first().map_or("", |a| a.as_ref());
            Err(RuntimeError::CommandFailed {
                command: format!("{} {first}", self.docker),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl NodeRuntime for DockerRuntime {
    async fn start(&self, node: &Node) -> Result<(), RuntimeError> {
        let id = self.run(self.run_args(node).as_slice()).await?;
        debug!(alias = node.alias(), container = %id, "container started");
        self.containers
            .lock()
            .await
            .insert(node.alias().to_string(), id);
        Ok(())
    }

    async fn stop(&self, node: &Node) -> Result<(), RuntimeError> {
        let id = self.container_id(node).await?;
        self.run(&["rm", "-f", id.as_str()]).await?;
        self.containers.lock().await.remove(node.alias());
        debug!(alias = node.alias(), container = %id, "container removed");
        Ok(())
    }

    async fn is_running(&self, node: &Node) -> bool {
        let Ok(id) = self.container_id(node).await else {
            return false;
        };
        matches!(
            self.run(&["inspect", "-f", "{{.State.Running}}", id.as_str()]).await,
            Ok(state) if state == "true"
        )
    }

    async fn wait_until_ready(&self, node: &Node, pattern: &ReadyPattern) -> Result<(), RuntimeError> {
        let id = self.container_id(node).await?;
        let mut child = Command::new(&self.docker)
            .args(["logs", "-f", id.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RuntimeError::Spawn(format!("{} logs: {e}", self.docker)))?;

        // The server logs to stdout, but `docker logs` replays stderr too.
        let (tx, mut rx) = mpsc::channel(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx));
        }

        while let Some(line) = rx.recv().await {
            if pattern.matches(&line) {
                debug!(alias = node.alias(), "ready line observed");
                child.kill().await.ok();
                return Ok(());
            }
        }

        child.wait().await.ok();
        Err(RuntimeError::ExitedBeforeReady)
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}
