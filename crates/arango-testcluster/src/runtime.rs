//! Contract with the process/container runtime that actually runs nodes.

use std::fmt;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::Node;

/// Log line the server prints once it accepts requests.
pub const READY_LOG_PATTERN: &str = ".*is ready for business. Have fun!.*";

/// Failures surfaced by a [`NodeRuntime`].
///
/// Never retried by the coordinator; callers own retry policy.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The runtime could not launch a process.
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    /// IO error talking to the runtime.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A runtime command exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Output ended before the ready line appeared.
    #[error("Process exited before signalling ready")]
    ExitedBeforeReady,

    /// Operation needs a started node.
    #[error("Node was never started")]
    NotStarted,

    /// Any other runtime failure.
    #[error("{0}")]
    Other(String),
}

/// Line matcher for the ready signal.
///
/// The pattern is a regular expression that must match the whole line, with
/// trailing `\r`/`\n` ignored. Use `.*` on either side for a substring match.
#[derive(Debug, Clone)]
pub struct ReadyPattern {
    source: String,
    regex: Regex,
}

impl ReadyPattern {
    /// Compiles `pattern`; invalid expressions are a configuration error.
    pub fn new(pattern: impl Into<String>) -> crate::Result<Self> {
        let source = pattern.into();
        let regex = Regex::new(&format!("^(?:{source})$"))
            .map_err(|e| crate::Error::Configuration(format!("invalid ready pattern: {e}")))?;
        Ok(Self { source, regex })
    }

    /// Returns true if `line` signals readiness.
    pub fn matches(&self, line: &str) -> bool {
        self.regex.is_match(line.trim_end_matches(['\r', '\n']))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for ReadyPattern {
    fn default() -> Self {
        Self::new(READY_LOG_PATTERN).expect("built-in ready pattern is valid")
    }
}

impl PartialEq for ReadyPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for ReadyPattern {}

impl fmt::Display for ReadyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Capability to run one node.
///
/// Implementations key their state by [`Node::alias`]. Calls for distinct
/// nodes may run concurrently.
#[async_trait]
pub trait NodeRuntime: Send + Sync {
    /// Launches the node. Returns once the launch was issued, not when ready.
    async fn start(&self, node: &Node) -> Result<(), RuntimeError>;

    /// Stops the node and releases its resources.
    async fn stop(&self, node: &Node) -> Result<(), RuntimeError>;

    /// Whether the node's process is currently alive.
    async fn is_running(&self, node: &Node) -> bool;

    /// Blocks until a line of the node's output matches `pattern`.
    async fn wait_until_ready(&self, node: &Node, pattern: &ReadyPattern)
        -> Result<(), RuntimeError>;
}
