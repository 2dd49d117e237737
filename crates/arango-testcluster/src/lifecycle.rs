//! Phased, dependency-ordered start and stop of a cluster.
//!
//! Start runs three phases separated by barriers:
//!
//! 1. **Leader**: the agency seed, alone.
//! 2. **Agents**: every follower agent, concurrently.
//! 3. **Servers**: every data server and coordinator, concurrently.
//!
//! Each barrier waits for all tasks of its phase under one deadline. Start is
//! fail-fast: the first failing node ends its phase, and later phases never
//! run. Stop walks the phases in reverse (coordinators, data servers,
//! followers, leader) and attempts every node regardless of failures.
//!
//! Expired deadlines detach the outstanding tasks instead of aborting them,
//! so runtime calls already issued keep running; call
//! [`LifecycleCoordinator::stop`] to reconcile.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::runtime::{NodeRuntime, ReadyPattern, RuntimeError};
use crate::{ClusterHandle, Error, Node, NodeStatus, Result};

/// Coordinator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterState {
    NotStarted,
    Starting,
    Running,
    Stopping,
    Stopped,
    /// A start or stop phase failed.
    Failed,
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterState::NotStarted => "not started",
            ClusterState::Starting => "starting",
            ClusterState::Running => "running",
            ClusterState::Stopping => "stopping",
            ClusterState::Stopped => "stopped",
            ClusterState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Barrier-separated group of nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Agency leader alone.
    Leader,
    /// Follower agents.
    Agents,
    /// Data servers and coordinators together (start only).
    Servers,
    /// Data servers alone (stop only).
    DataServers,
    /// Coordinators alone (stop only).
    Coordinators,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Leader => "leader",
            Phase::Agents => "agents",
            Phase::Servers => "servers",
            Phase::DataServers => "data servers",
            Phase::Coordinators => "coordinators",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Start,
    Stop,
}

/// Drives a [`ClusterHandle`] through its lifecycle against a [`NodeRuntime`].
pub struct LifecycleCoordinator {
    runtime: Arc<dyn NodeRuntime>,
    ready_pattern: ReadyPattern,
    state: ClusterState,
    statuses: HashMap<String, NodeStatus>,
}

impl LifecycleCoordinator {
    /// Creates a coordinator waiting on the default ready line.
    pub fn new(runtime: Arc<dyn NodeRuntime>) -> Self {
        Self {
            runtime,
            ready_pattern: ReadyPattern::default(),
            state: ClusterState::NotStarted,
            statuses: HashMap::new(),
        }
    }

    /// Overrides the pattern passed to [`NodeRuntime::wait_until_ready`].
    pub fn with_ready_pattern(mut self, pattern: ReadyPattern) -> Self {
        self.ready_pattern = pattern;
        self
    }

    pub fn state(&self) -> ClusterState {
        self.state
    }

    /// Status of a node; nodes never touched report `NotStarted`.
    pub fn status(&self, alias: &str) -> NodeStatus {
        self.statuses
            .get(alias)
            .copied()
            .unwrap_or(NodeStatus::NotStarted)
    }

    /// Statuses of every node of `handle`, in accessor order.
    pub fn statuses<'a>(&self, handle: &'a ClusterHandle) -> Vec<(&'a str, NodeStatus)> {
        handle
            .nodes()
            .map(|n| (n.alias(), self.status(n.alias())))
            .collect()
    }

    /// Number of nodes that signalled ready and were not stopped since.
    pub fn ready_count(&self) -> usize {
        self.statuses
            .values()
            .filter(|s| **s == NodeStatus::Ready)
            .count()
    }

    /// Starts the cluster phase by phase.
    ///
    /// `timeout` bounds each phase barrier separately. On failure the
    /// coordinator is `Failed` and the error lists every node of the failing
    /// phase that did not become ready.
    pub async fn start(&mut self, handle: &ClusterHandle, timeout: Duration) -> Result<()> {
        if self.state != ClusterState::NotStarted {
            return Err(Error::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        self.state = ClusterState::Starting;
        info!(nodes = handle.len(), "starting cluster");

        let phases: [(Phase, Vec<&Node>); 3] = [
            (Phase::Leader, vec![handle.agent_leader()]),
            (Phase::Agents, handle.followers().iter().collect()),
            (
                Phase::Servers,
                handle
                    .databases()
                    .iter()
                    .chain(handle.coordinators())
                    .collect(),
            ),
        ];

        for (phase, nodes) in phases {
            if nodes.is_empty() {
                continue;
            }
            debug_assert!(nodes.iter().all(|n| self.dependencies_ready(n)));

            let failures = self.run_phase(phase, Action::Start, &nodes, timeout).await;
            if !failures.is_empty() {
                self.state = ClusterState::Failed;
                warn!(%phase, failed = failures.len(), "cluster start aborted");
                return Err(Error::PhaseFailed { phase, failures });
            }
        }

        self.state = ClusterState::Running;
        info!(nodes = handle.len(), "cluster running");
        Ok(())
    }

    /// Stops the cluster in reverse dependency order.
    ///
    /// Every node that was started is attempted even if siblings or earlier
    /// phases fail. Ends `Stopped`, or `Failed` with every failure listed.
    pub async fn stop(&mut self, handle: &ClusterHandle, timeout: Duration) -> Result<()> {
        if !matches!(self.state, ClusterState::Running | ClusterState::Failed) {
            return Err(Error::InvalidState {
                operation: "stop",
                state: self.state,
            });
        }

        self.state = ClusterState::Stopping;
        info!(nodes = handle.len(), "stopping cluster");

        let phases: [(Phase, &[Node]); 4] = [
            (Phase::Coordinators, handle.coordinators()),
            (Phase::DataServers, handle.databases()),
            (Phase::Agents, handle.followers()),
            (Phase::Leader, std::slice::from_ref(handle.agent_leader())),
        ];

        let mut failures = Vec::new();
        for (phase, nodes) in phases {
            // Nothing to reconcile for untouched or already stopped nodes.
            let nodes: Vec<&Node> = nodes
                .iter()
                .filter(|n| {
                    !matches!(
                        self.status(n.alias()),
                        NodeStatus::NotStarted | NodeStatus::Stopped
                    )
                })
                .collect();
            if nodes.is_empty() {
                continue;
            }
            failures.extend(self.run_phase(phase, Action::Stop, &nodes, timeout).await);
        }

        if failures.is_empty() {
            self.state = ClusterState::Stopped;
            info!("cluster stopped");
            Ok(())
        } else {
            self.state = ClusterState::Failed;
            warn!(failed = failures.len(), "cluster stop finished with failures");
            Err(Error::StopFailed { failures })
        }
    }

    /// Probes every ready node and marks the ones no longer running as failed.
    ///
    /// Returns the aliases newly marked failed.
    pub async fn refresh(&mut self, handle: &ClusterHandle) -> Vec<String> {
        let mut crashed = Vec::new();
        for node in handle.nodes() {
            if self.status(node.alias()) == NodeStatus::Ready
                && !self.runtime.is_running(node).await
            {
                warn!(alias = node.alias(), "node no longer running");
                self.statuses
                    .insert(node.alias().to_string(), NodeStatus::Failed);
                crashed.push(node.alias().to_string());
            }
        }
        crashed
    }

    fn dependencies_ready(&self, node: &Node) -> bool {
        node.depends_on()
            .iter()
            .all(|dep| self.status(dep) == NodeStatus::Ready)
    }

    /// Runs one action over `nodes` concurrently and joins at a barrier.
    ///
    /// Returns one error per failed node, plus a single timeout error naming
    /// every node still pending when the deadline expired. A start phase stops
    /// waiting at its first failure and reports the nodes still pending as
    /// not ready; their tasks are detached.
    async fn run_phase(
        &mut self,
        phase: Phase,
        action: Action,
        nodes: &[&Node],
        timeout: Duration,
    ) -> Vec<Error> {
        let (in_flight, done) = match action {
            Action::Start => (NodeStatus::Starting, NodeStatus::Ready),
            Action::Stop => (NodeStatus::Stopping, NodeStatus::Stopped),
        };
        debug!(%phase, ?action, nodes = nodes.len(), "phase begin");

        let deadline = Instant::now() + timeout;
        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut tasks = JoinSet::new();

        for node in nodes {
            let node = (*node).clone();
            let runtime = Arc::clone(&self.runtime);
            let pattern = self.ready_pattern.clone();

            self.statuses.insert(node.alias.clone(), in_flight);
            pending.insert(node.alias.clone());

            tasks.spawn(async move {
                let result = match action {
                    Action::Start => start_node(runtime.as_ref(), &node, &pattern).await,
                    Action::Stop => runtime.stop(&node).await,
                };
                (node.alias, result)
            });
        }

        let mut failures = Vec::new();
        let mut abandoned = false;
        loop {
            let joined = match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_elapsed) => {
                    let timed_out: Vec<String> = pending.iter().cloned().collect();
                    warn!(%phase, pending = ?timed_out, "phase deadline exceeded");
                    for alias in &timed_out {
                        self.statuses.insert(alias.clone(), NodeStatus::Failed);
                    }
                    tasks.detach_all();
                    failures.push(Error::LifecycleTimeout {
                        phase,
                        timeout,
                        pending: timed_out,
                    });
                    return failures;
                }
            };

            let failed = self.record(phase, done, joined, &mut pending, &mut failures);

            // Start is fail-fast: keep what already finished, give up on the rest.
            if failed && matches!(action, Action::Start) {
                while let Some(joined) = tasks.try_join_next() {
                    self.record(phase, done, joined, &mut pending, &mut failures);
                }
                if !tasks.is_empty() {
                    warn!(%phase, pending = ?pending, "abandoning phase after node failure");
                    tasks.detach_all();
                    abandoned = true;
                }
                break;
            }
        }

        let reason = if abandoned {
            "start abandoned after another node of the phase failed"
        } else {
            "node task panicked"
        };
        for alias in pending {
            self.statuses.insert(alias.clone(), NodeStatus::Failed);
            failures.push(Error::RuntimeDelegation {
                alias,
                source: RuntimeError::Other(reason.to_string()),
            });
        }
        failures
    }

    /// Applies one joined task outcome. Returns true if the node failed.
    fn record(
        &mut self,
        phase: Phase,
        done: NodeStatus,
        joined: std::result::Result<(String, std::result::Result<(), RuntimeError>), JoinError>,
        pending: &mut BTreeSet<String>,
        failures: &mut Vec<Error>,
    ) -> bool {
        match joined {
            Ok((alias, Ok(()))) => {
                pending.remove(&alias);
                debug!(%alias, %phase, status = %done, "node done");
                self.statuses.insert(alias, done);
                false
            }
            Ok((alias, Err(source))) => {
                pending.remove(&alias);
                warn!(%alias, %phase, error = %source, "node failed");
                self.statuses.insert(alias.clone(), NodeStatus::Failed);
                failures.push(Error::RuntimeDelegation { alias, source });
                true
            }
            // Panicked task: its alias stays pending and is reported by the caller.
            Err(join_error) => {
                warn!(%phase, error = %join_error, "node task panicked");
                true
            }
        }
    }
}

async fn start_node(
    runtime: &dyn NodeRuntime,
    node: &Node,
    pattern: &ReadyPattern,
) -> std::result::Result<(), RuntimeError> {
    runtime.start(node).await?;
    runtime.wait_until_ready(node, pattern).await
}

impl fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("ready_pattern", &self.ready_pattern)
            .field("state", &self.state)
            .field("statuses", &self.statuses)
            .finish_non_exhaustive()
    }
}
