//! Scripted in-memory runtime shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use arango_testcluster::{Node, NodeRuntime, ReadyPattern, RuntimeError};
use async_trait::async_trait;

/// Runtime call observed by [`ScriptedRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    Ready(String),
    Stop(String),
}

/// Runtime whose behaviour per alias is scripted up front.
///
/// Every call is appended to an event log in the order it happened.
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    events: Mutex<Vec<Event>>,
    fail_start: HashSet<String>,
    fail_ready: HashSet<String>,
    fail_stop: HashSet<String>,
    fail_stop_once: Mutex<HashSet<String>>,
    never_ready: HashSet<String>,
    never_stop: HashSet<String>,
    ready_delay: Duration,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_start(mut self, alias: &str) -> Self {
        self.fail_start.insert(alias.to_string());
        self
    }

    pub fn failing_ready(mut self, alias: &str) -> Self {
        self.fail_ready.insert(alias.to_string());
        self
    }

    pub fn failing_stop(mut self, alias: &str) -> Self {
        self.fail_stop.insert(alias.to_string());
        self
    }

    /// Fails the first stop of `alias`; later stops succeed.
    pub fn failing_stop_once(self, alias: &str) -> Self {
        self.fail_stop_once.lock().unwrap().insert(alias.to_string());
        self
    }

    pub fn never_stop(mut self, alias: &str) -> Self {
        self.never_stop.insert(alias.to_string());
        self
    }

    pub fn never_ready(mut self, alias: &str) -> Self {
        self.never_ready.insert(alias.to_string());
        self
    }

    pub fn with_ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Position of the first occurrence of `event`.
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Start(alias) => Some(alias),
                _ => None,
            })
            .collect()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Stop(alias) => Some(alias),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl NodeRuntime for ScriptedRuntime {
    async fn start(&self, node: &Node) -> Result<(), RuntimeError> {
        self.record(Event::Start(node.alias().to_string()));
        if self.fail_start.contains(node.alias()) {
            return Err(RuntimeError::Spawn(format!("cannot launch {}", node.alias())));
        }
        Ok(())
    }

    async fn stop(&self, node: &Node) -> Result<(), RuntimeError> {
        self.record(Event::Stop(node.alias().to_string()));
        if self.never_stop.contains(node.alias()) {
            std::future::pending::<()>().await;
        }
        let fail_once = self.fail_stop_once.lock().unwrap().remove(node.alias());
        if fail_once || self.fail_stop.contains(node.alias()) {
            return Err(RuntimeError::Other(format!("cannot remove {}", node.alias())));
        }
        Ok(())
    }

    async fn is_running(&self, node: &Node) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|e| match e {
                Event::Ready(alias) if alias == node.alias() => Some(true),
                Event::Stop(alias) if alias == node.alias() => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    async fn wait_until_ready(
        &self,
        node: &Node,
        _pattern: &ReadyPattern,
    ) -> Result<(), RuntimeError> {
        if self.never_ready.contains(node.alias()) {
            std::future::pending::<()>().await;
        }
        if !self.ready_delay.is_zero() {
            tokio::time::sleep(self.ready_delay).await;
        }
        if self.fail_ready.contains(node.alias()) {
            return Err(RuntimeError::ExitedBeforeReady);
        }
        self.record(Event::Ready(node.alias().to_string()));
        Ok(())
    }
}
