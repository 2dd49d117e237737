//! Node definitions and runtime status.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::Role;

/// Environment variable disabling authentication in the server image.
pub const ENV_NO_AUTH: &str = "ARANGO_NO_AUTH";

/// Environment variable carrying the root password in the server image.
pub const ENV_ROOT_PASSWORD: &str = "ARANGO_ROOT_PASSWORD";

/// Runtime status of a cluster node, as tracked by the lifecycle coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStatus {
    /// No start call issued yet.
    NotStarted,

    /// Start issued, waiting for the ready signal.
    Starting,

    /// Ready signal observed.
    Ready,

    /// Stop issued.
    Stopping,

    /// Stop completed.
    Stopped,

    /// Start or stop failed, or the node crashed.
    Failed,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStatus::NotStarted => "not started",
            NodeStatus::Starting => "starting",
            NodeStatus::Ready => "ready",
            NodeStatus::Stopping => "stopping",
            NodeStatus::Stopped => "stopped",
            NodeStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One server process definition.
///
/// Built once by the topology builder and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub(crate) alias: String,
    pub(crate) role: Role,
    pub(crate) endpoint: String,
    pub(crate) command: Vec<String>,
    pub(crate) depends_on: Vec<String>,
    pub(crate) image: String,
    #[serde(skip)]
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) server_port: u16,
    pub(crate) exposed_port: Option<u16>,
}

impl Node {
    /// Unique network alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// `tcp://<alias>:<port>` address other nodes use to reach this one.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ordered startup arguments, binary first.
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Aliases that must be ready before this node starts, in construction order.
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Returns true if `alias` is among this node's dependencies.
    pub fn depends_on_alias(&self, alias: &str) -> bool {
        self.depends_on.iter().any(|dep| dep == alias)
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    /// Process environment implementing the auth contract.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Port the server listens on inside its network namespace.
    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Host port the server port is published on, if any.
    pub fn exposed_port(&self) -> Option<u16> {
        self.exposed_port
    }

    /// Whether the node runs with `--server.authentication=true`.
    pub fn authentication(&self) -> bool {
        self.command
            .iter()
            .any(|arg| arg == "--server.authentication=true")
    }
}
