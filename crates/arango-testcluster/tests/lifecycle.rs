//! Phase ordering, fail-fast start and best-effort stop against a scripted runtime.

mod common;

use std::sync::Arc;
use std::time::Duration;

use arango_testcluster::{
    ClusterConfig, ClusterHandle, ClusterState, Error, LifecycleCoordinator, NodeStatus, Phase,
    start_cluster,
};
use common::{Event, ScriptedRuntime};

const TIMEOUT: Duration = Duration::from_secs(5);

fn handle() -> ClusterHandle {
    ClusterConfig::builder()
        .with_password("jjj")
        .build_topology()
        .unwrap()
}

fn follower_aliases(handle: &ClusterHandle) -> Vec<String> {
    handle
        .followers()
        .iter()
        .map(|n| n.alias().to_string())
        .collect()
}

fn server_aliases(handle: &ClusterHandle) -> Vec<String> {
    handle
        .databases()
        .iter()
        .chain(handle.coordinators())
        .map(|n| n.alias().to_string())
        .collect()
}

#[tokio::test]
async fn leader_ready_before_any_follower_starts() {
    let handle = handle();
    let runtime = Arc::new(ScriptedRuntime::new().with_ready_delay(Duration::from_millis(10)));
    let mut coordinator = LifecycleCoordinator::new(runtime.clone());

    coordinator.start(&handle, TIMEOUT).await.unwrap();

    let leader_ready = runtime
        .position(&Event::Ready("agent-leader".to_string()))
        .unwrap();
    for alias in follower_aliases(&handle) {
        let started = runtime.position(&Event::Start(alias)).unwrap();
        assert!(leader_ready < started);
    }
}

#[tokio::test]
async fn agents_ready_before_any_server_starts() {
    let handle = handle();
    let runtime = Arc::new(ScriptedRuntime::new().with_ready_delay(Duration::from_millis(10)));
    let mut coordinator = LifecycleCoordinator::new(runtime.clone());

    coordinator.start(&handle, TIMEOUT).await.unwrap();

    let last_agent_ready = handle
        .agents()
        .iter()
        .map(|a| runtime.position(&Event::Ready(a.alias().to_string())).unwrap())
        .max()
        .unwrap();
    let first_server_start = server_aliases(&handle)
        .into_iter()
        .map(|alias| runtime.position(&Event::Start(alias)).unwrap())
        .min()
        .unwrap();

    assert!(last_agent_ready < first_server_start);
    assert_eq!(coordinator.state(), ClusterState::Running);
    assert_eq!(coordinator.ready_count(), handle.len());
}

#[tokio::test]
async fn agent_failure_skips_server_phase() {
    let handle = handle();
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .failing_start("agent-2")
            .failing_ready("agent-3"),
    );
    let mut coordinator = LifecycleCoordinator::new(runtime.clone());

    let err = coordinator.start(&handle, TIMEOUT).await.unwrap_err();

    assert!(matches!(
        err,
        Error::PhaseFailed {
            phase: Phase::Agents,
            ..
        }
    ));
    let mut failed = err.failed_nodes();
    failed.sort_unstable();
    assert_eq!(failed, vec!["agent-2", "agent-3"]);

    let started = runtime.started();
    for alias in server_aliases(&handle) {
        assert!(!started.contains(&alias), "{alias} must not be started");
        assert_eq!(coordinator.status(&alias), NodeStatus::NotStarted);
    }
    assert_eq!(coordinator.state(), ClusterState::Failed);
    assert_eq!(coordinator.status("agent-leader"), NodeStatus::Ready);
    assert_eq!(coordinator.status("agent-2"), NodeStatus::Failed);
}

#[tokio::test]
async fn leader_failure_skips_followers() {
    let handle = handle();
    let runtime = Arc::new(ScriptedRuntime::new().failing_ready("agent-leader"));
    let mut coordinator = LifecycleCoordinator::new(runtime.clone());

    let err = coordinator.start(&handle, TIMEOUT).await.unwrap_err();

    assert!(matches!(
        err,
        Error::PhaseFailed {
            phase: Phase::Leader,
            ..
        }
    ));
    assert_eq!(runtime.started(), vec!["agent-leader".to_string()]);
}

#[tokio::test]
async fn phase_timeout_names_pending_nodes() {
    let handle = handle();
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .never_ready("dbserver-1")
            .never_ready("coordinator-2"),
    );
    let mut coordinator = LifecycleCoordinator::new(runtime.clone());

    let err = coordinator
        .start(&handle, Duration::from_millis(200))
        .await
        .unwrap_err();

    let Error::PhaseFailed { phase, failures } = &err else {
        panic!("expected PhaseFailed, got {err:?}");
    };
    assert_eq!(*phase, Phase::Servers);
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0],
        Error::LifecycleTimeout { pending, .. }
            if pending == &vec!["coordinator-2".to_string(), "dbserver-1".to_string()]
    ));

    assert_eq!(coordinator.state(), ClusterState::Failed);
    assert_eq!(coordinator.status("dbserver-1"), NodeStatus::Failed);
    assert_eq!(coordinator.status("dbserver-2"), NodeStatus::Ready);
    assert_eq!(coordinator.status("coordinator-1"), NodeStatus::Ready);
}

#[tokio::test]
async fn stop_order_is_reverse_of_dependencies() {
    let handle = handle();
    let runtime = Arc::new(ScriptedRuntime::new());
    let mut coordinator = LifecycleCoordinator::new(runtime.clone());
    coordinator.start(&handle, TIMEOUT).await.unwrap();

    coordinator.stop(&handle, TIMEOUT).await.unwrap();

    let stopped = runtime.stopped();
    assert_eq!(stopped.len(), handle.len());
    let pos = |alias: &str| stopped.iter().position(|a| a == alias).unwrap();

    for coordinator_node in handle.coordinators() {
        for db in handle.databases() {
            assert!(pos(coordinator_node.alias()) < pos(db.alias()));
        }
    }
    for db in handle.databases() {
        for follower in handle.followers() {
            assert!(pos(db.alias()) < pos(follower.alias()));
        }
    }
    assert_eq!(stopped.last().map(String::as_str), Some("agent-leader"));
    assert_eq!(coordinator.state(), ClusterState::Stopped);
}

#[tokio::test]
async fn stop_attempts_every_node_despite_failures() {
    let handle = handle();
    let runtime = Arc::new(ScriptedRuntime::new().failing_stop("dbserver-1"));
    let mut coordinator = LifecycleCoordinator::new(runtime.clone());
    coordinator.start(&handle, TIMEOUT).await.unwrap();

    let err = coordinator.stop(&handle, TIMEOUT).await.unwrap_err();

    assert!(matches!(err, Error::StopFailed { .. }));
    assert_eq!(err.failed_nodes(), vec!["dbserver-1"]);
    assert_eq!(runtime.stopped().len(), 7);
    assert_eq!(coordinator.state(), ClusterState::Failed);
    assert_eq!(coordinator.status("dbserver-1"), NodeStatus::Failed);
    assert_eq!(coordinator.status("agent-leader"), NodeStatus::Stopped);
}

#[tokio::test]
async fn stop_after_failed_start_skips_untouched_nodes() {
    let handle = handle();
    let runtime = Arc::new(ScriptedRuntime::new().failing_ready("agent-2"));
    let mut coordinator = LifecycleCoordinator::new(runtime.clone());
    coordinator.start(&handle, TIMEOUT).await.unwrap_err();

    coordinator.stop(&handle, TIMEOUT).await.unwrap();

    let mut stopped = runtime.stopped();
    stopped.sort_unstable();
    assert_eq!(stopped, vec!["agent-2", "agent-3", "agent-leader"]);
    assert_eq!(coordinator.state(), ClusterState::Stopped);
}

#[tokio::test]
async fn start_cluster_cleans_up_after_failure() {
    let handle = handle();
    let runtime = Arc::new(ScriptedRuntime::new().failing_start("coordinator-1"));

    let err = start_cluster(&handle, runtime.clone(), TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::PhaseFailed {
            phase: Phase::Servers,
            ..
        }
    ));
    assert!(err.failed_nodes().contains(&"coordinator-1"));
    assert_eq!(runtime.stopped().len(), handle.len());
}

#[tokio::test]
async fn refresh_detects_stopped_node() {
    let handle = handle();
    let runtime = Arc::new(ScriptedRuntime::new());
    let mut coordinator = start_cluster(&handle, runtime.clone(), TIMEOUT)
        .await
        .unwrap();

    assert!(coordinator.refresh(&handle).await.is_empty());
    assert_eq!(coordinator.ready_count(), 7);
}

#[tokio::test]
async fn stop_retry_only_touches_unstopped_nodes() {
    let handle = handle();
    let runtime = Arc::new(ScriptedRuntime::new().failing_stop_once("dbserver-1"));
    let mut coordinator = LifecycleCoordinator::new(runtime.clone());
    coordinator.start(&handle, TIMEOUT).await.unwrap();

    coordinator.stop(&handle, TIMEOUT).await.unwrap_err();
    assert_eq!(runtime.stopped().len(), 7);
    assert_eq!(coordinator.state(), ClusterState::Failed);

    coordinator.stop(&handle, TIMEOUT).await.unwrap();

    let stopped = runtime.stopped();
    assert_eq!(stopped.len(), 8);
    assert_eq!(stopped.last().map(String::as_str), Some("dbserver-1"));
    assert_eq!(coordinator.state(), ClusterState::Stopped);
    assert!(coordinator
        .statuses(&handle)
        .iter()
        .all(|(_, s)| *s == NodeStatus::Stopped));
}

#[tokio::test]
async fn stop_deadline_is_recorded_and_later_phases_run() {
    let handle = handle();
    let runtime = Arc::new(ScriptedRuntime::new().never_stop("coordinator-1"));
    let mut coordinator = LifecycleCoordinator::new(runtime.clone());
    coordinator.start(&handle, TIMEOUT).await.unwrap();

    let err = coordinator
        .stop(&handle, Duration::from_millis(200))
        .await
        .unwrap_err();

    let Error::StopFailed { failures } = &err else {
        panic!("expected StopFailed, got {err:?}");
    };
    assert!(matches!(
        failures.as_slice(),
        [Error::LifecycleTimeout {
            phase: Phase::Coordinators,
            ..
        }]
    ));
    assert_eq!(err.failed_nodes(), vec!["coordinator-1"]);
    assert_eq!(runtime.stopped().len(), 7);
    assert_eq!(coordinator.state(), ClusterState::Failed);
    assert_eq!(coordinator.status("coordinator-1"), NodeStatus::Failed);
    assert_eq!(coordinator.status("agent-leader"), NodeStatus::Stopped);
}

#[tokio::test]
async fn start_phase_ends_at_first_failure() {
    let handle = handle();
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .failing_start("agent-2")
            .never_ready("agent-3"),
    );
    let mut coordinator = LifecycleCoordinator::new(runtime.clone());

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        coordinator.start(&handle, Duration::from_secs(60)),
    )
    .await
    .expect("start must not wait for the phase deadline")
    .unwrap_err();

    assert!(matches!(
        err,
        Error::PhaseFailed {
            phase: Phase::Agents,
            ..
        }
    ));
    let mut failed = err.failed_nodes();
    failed.sort_unstable();
    assert_eq!(failed, vec!["agent-2", "agent-3"]);
    assert_eq!(coordinator.status("agent-3"), NodeStatus::Failed);
    assert_eq!(coordinator.state(), ClusterState::Failed);
    for alias in server_aliases(&handle) {
        assert!(!runtime.started().contains(&alias));
    }
}
