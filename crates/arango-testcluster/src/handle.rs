//! Immutable, role-indexed view over a built cluster.

use std::fmt;

use serde::Serialize;

use crate::config::AuthMode;
use crate::{Error, Node, Result, Role};

/// Client-visible entry point of a coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HostAndPort {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for HostAndPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A built cluster topology.
///
/// Agents are kept in construction order with the leader at index 0. Role
/// lists are frozen after construction and only exposed as shared slices.
#[derive(Debug, Clone)]
pub struct ClusterHandle {
    agents: Vec<Node>,
    databases: Vec<Node>,
    coordinators: Vec<Node>,
    auth: AuthMode,
    password: Option<String>,
    user: String,
    host: String,
    image: String,
}

impl ClusterHandle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        agents: Vec<Node>,
        databases: Vec<Node>,
        coordinators: Vec<Node>,
        auth: AuthMode,
        password: Option<String>,
        user: String,
        host: String,
        image: String,
    ) -> Self {
        debug_assert!(
            agents.first().is_some_and(|a| a.role == Role::AgentLeader),
            "leader must be the first agent"
        );
        debug_assert!(!coordinators.is_empty(), "cluster needs a coordinator");
        Self {
            agents,
            databases,
            coordinators,
            auth,
            password,
            user,
            host,
            image,
        }
    }

    /// The agency seed node.
    pub fn agent_leader(&self) -> &Node {
        &self.agents[0]
    }

    /// Agent by index; 0 is the leader, 1.. are followers.
    pub fn agent(&self, index: usize) -> Result<&Node> {
        lookup(&self.agents, Role::Agent, index)
    }

    /// All agents, leader first.
    pub fn agents(&self) -> &[Node] {
        &self.agents
    }

    /// Non-leader agents in construction order.
    pub fn followers(&self) -> &[Node] {
        &self.agents[1..]
    }

    pub fn database(&self, index: usize) -> Result<&Node> {
        lookup(&self.databases, Role::DataServer, index)
    }

    pub fn databases(&self) -> &[Node] {
        &self.databases
    }

    pub fn coordinator(&self, index: usize) -> Result<&Node> {
        lookup(&self.coordinators, Role::Coordinator, index)
    }

    pub fn coordinators(&self) -> &[Node] {
        &self.coordinators
    }

    /// Every node in accessor order: leader, followers, data servers, coordinators.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.agents
            .iter()
            .chain(&self.databases)
            .chain(&self.coordinators)
    }

    /// Looks a node up by alias.
    pub fn node(&self, alias: &str) -> Option<&Node> {
        self.nodes().find(|n| n.alias == alias)
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.agents.len() + self.databases.len() + self.coordinators.len()
    }

    /// Always false for a built cluster.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One entry per coordinator, in coordinator order.
    pub fn hosts_and_ports(&self) -> Vec<HostAndPort> {
        self.coordinators
            .iter()
            .map(|c| HostAndPort {
                host: self.host.clone(),
                port: c.exposed_port.unwrap_or(c.server_port),
            })
            .collect()
    }

    /// Host of the default client entry point.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port of the first coordinator.
    pub fn port(&self) -> u16 {
        let first = &self.coordinators[0];
        first.exposed_port.unwrap_or(first.server_port)
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Root password for coordinators.
    ///
    /// Fails when the cluster runs without authentication.
    pub fn password(&self) -> Result<&str> {
        self.password
            .as_deref()
            .ok_or(Error::UnsupportedOperation(
                "cluster runs without authentication",
            ))
    }

    /// Auth mode as configured; a random password is available via [`Self::password`].
    pub fn auth_mode(&self) -> &AuthMode {
        &self.auth
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

fn lookup(nodes: &[Node], role: Role, index: usize) -> Result<&Node> {
    nodes.get(index).ok_or(Error::IndexOutOfRange {
        role,
        index,
        count: nodes.len(),
    })
}
