//! Node roles, naming and per-role command lines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of a node in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// First agent bootstrapped; seeds the agency.
    AgentLeader,

    /// Agency member referencing the leader.
    Agent,

    /// Holds data shards (`DBSERVER`).
    DataServer,

    /// Client-facing query router.
    Coordinator,
}

impl Role {
    /// All roles in start order.
    pub const ALL: [Role; 4] = [
        Role::AgentLeader,
        Role::Agent,
        Role::DataServer,
        Role::Coordinator,
    ];

    /// Network alias prefix for nodes of this role.
    pub fn alias_prefix(self) -> &'static str {
        match self {
            Role::AgentLeader => "agent-leader",
            Role::Agent => "agent",
            Role::DataServer => "dbserver",
            Role::Coordinator => "coordinator",
        }
    }

    /// Value passed to `--cluster.my-role`, if the role takes one.
    pub fn cluster_role(self) -> Option<&'static str> {
        match self {
            Role::AgentLeader | Role::Agent => None,
            Role::DataServer => Some("DBSERVER"),
            Role::Coordinator => Some("COORDINATOR"),
        }
    }

    /// Returns true for agency members, leader included.
    pub fn is_agent(self) -> bool {
        matches!(self, Role::AgentLeader | Role::Agent)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::AgentLeader => "agent leader",
            Role::Agent => "agent",
            Role::DataServer => "data server",
            Role::Coordinator => "coordinator",
        };
        f.write_str(name)
    }
}

/// Inputs for a single node's command line.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    pub role: Role,
    pub alias: &'a str,
    pub endpoint: &'a str,
    /// Total number of agents, passed as `--agency.size`.
    pub agent_count: usize,
    /// Leader endpoint for follower agents, every agent endpoint for servers.
    /// Ignored for the leader.
    pub agency_endpoints: &'a [String],
    pub authentication: bool,
    /// Appended verbatim after the role arguments.
    pub extra_args: &'a [String],
}

/// Pure mapping from roles to aliases, endpoints and command lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCatalog {
    binary: String,
    port: u16,
}

impl RoleCatalog {
    /// Creates a catalog for the given server binary and internal port.
    pub fn new(binary: impl Into<String>, port: u16) -> Self {
        assert!(port > 0, "server port must be positive");
        Self {
            binary: binary.into(),
            port,
        }
    }

    /// Internal port every node listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Server binary placed at the head of each command.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Alias for the node of `role` with the given 1-based index.
    ///
    /// The leader alias carries no index suffix.
    pub fn alias_for(&self, role: Role, index: usize) -> String {
        match role {
            Role::AgentLeader => role.alias_prefix().to_string(),
            _ => format!("{}-{}", role.alias_prefix(), index),
        }
    }

    /// `tcp://<alias>:<port>`.
    pub fn endpoint_for(&self, alias: &str, port: u16) -> String {
        assert!(!alias.is_empty(), "alias must not be empty");
        assert!(port > 0, "port must be positive");
        format!("tcp://{alias}:{port}")
    }

    /// Ordered startup arguments for a node.
    pub fn command_for(&self, ctx: &CommandContext<'_>) -> Vec<String> {
        assert!(!ctx.alias.is_empty(), "alias must not be empty");

        let mut cmd = vec![
            self.binary.clone(),
            "--server.endpoint".to_string(),
            format!("tcp://0.0.0.0:{}", self.port),
            format!("--server.authentication={}", ctx.authentication),
        ];

        match ctx.role.cluster_role() {
            None => {
                push_pair(&mut cmd, "--agency.my-address", ctx.endpoint);
                push_pair(&mut cmd, "--agency.activate", "true");
                push_pair(&mut cmd, "--agency.size", &ctx.agent_count.to_string());
                push_pair(&mut cmd, "--agency.supervision", "true");
                push_pair(&mut cmd, "--database.directory", ctx.alias);
                if ctx.role == Role::Agent {
                    for endpoint in ctx.agency_endpoints {
                        push_pair(&mut cmd, "--agency.endpoint", endpoint);
                    }
                }
            }
            Some(cluster_role) => {
                push_pair(&mut cmd, "--cluster.my-local-info", ctx.alias);
                push_pair(&mut cmd, "--cluster.my-role", cluster_role);
                push_pair(&mut cmd, "--cluster.my-address", ctx.endpoint);
                push_pair(&mut cmd, "--database.directory", ctx.alias);
                for endpoint in ctx.agency_endpoints {
                    push_pair(&mut cmd, "--cluster.agency-endpoint", endpoint);
                }
            }
        }

        cmd.extend(ctx.extra_args.iter().cloned());
        cmd
    }
}

fn push_pair(cmd: &mut Vec<String>, flag: &str, value: &str) {
    cmd.push(flag.to_string());
    cmd.push(value.to_string());
}
