//! Error types for cluster provisioning and lifecycle management.

use std::fmt::Write as _;
use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::{ClusterState, Phase};
use crate::role::Role;
use crate::runtime::RuntimeError;

/// Cluster provisioning errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid cluster shape, contradictory auth or blank image reference.
    ///
    /// Raised before any node exists.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Accessor index exceeds the role's node count.
    #[error("{role} index {index} out of range (cluster has {count})")]
    IndexOutOfRange {
        role: Role,
        index: usize,
        count: usize,
    },

    /// Operation not available for the cluster's auth mode.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// A phase barrier exceeded its deadline.
    #[error("{phase} phase timed out after {timeout:?} waiting for {}", .pending.join(", "))]
    LifecycleTimeout {
        phase: Phase,
        timeout: Duration,
        pending: Vec<String>,
    },

    /// The runtime collaborator failed for a node.
    #[error("Runtime failure on node {alias}: {source}")]
    RuntimeDelegation {
        alias: String,
        #[source]
        source: RuntimeError,
    },

    /// A start phase failed; later phases were not attempted.
    #[error("{phase} phase failed: {}", summarize(.failures))]
    PhaseFailed { phase: Phase, failures: Vec<Error> },

    /// One or more nodes failed to stop. Every node was still attempted.
    #[error("Cluster stop failed: {}", summarize(.failures))]
    StopFailed { failures: Vec<Error> },

    /// Operation is not valid in the coordinator's current state.
    #[error("Cannot {operation} a cluster in state {state}")]
    InvalidState {
        operation: &'static str,
        state: ClusterState,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Layered configuration could not be built or deserialized.
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
}

impl Error {
    /// Aliases of every node named by this error, in report order.
    ///
    /// Aggregated errors are flattened, so a `PhaseFailed` returns every node
    /// of the phase that did not become ready.
    pub fn failed_nodes(&self) -> Vec<&str> {
        match self {
            Self::RuntimeDelegation { alias, .. } => vec![alias.as_str()],
            Self::LifecycleTimeout { pending, .. } => pending.iter().map(String::as_str).collect(),
            Self::PhaseFailed { failures, .. } | Self::StopFailed { failures } => {
                failures.iter().flat_map(Error::failed_nodes).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn summarize(failures: &[Error]) -> String {
    let mut out = String::new();
    for (i, failure) in failures.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        let _ = write!(out, "{failure}");
    }
    out
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_nodes_flattens_aggregates() {
        let err = Error::PhaseFailed {
            phase: Phase::Servers,
            failures: vec![
                Error::RuntimeDelegation {
                    alias: "dbserver-1".to_string(),
                    source: RuntimeError::Other("no space left".to_string()),
                },
                Error::LifecycleTimeout {
                    phase: Phase::Servers,
                    timeout: Duration::from_secs(1),
                    pending: vec!["coordinator-1".to_string(), "coordinator-2".to_string()],
                },
            ],
        };

        assert_eq!(
            err.failed_nodes(),
            vec!["dbserver-1", "coordinator-1", "coordinator-2"]
        );
        let message = err.to_string();
        assert!(message.contains("dbserver-1"));
        assert!(message.contains("coordinator-2"));
    }

    #[test]
    fn test_configuration_error_names_no_nodes() {
        let err = Error::Configuration("agent count must be odd".to_string());
        assert!(err.failed_nodes().is_empty());
    }
}
