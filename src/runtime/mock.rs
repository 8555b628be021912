//! Mock runtime for testing and dry runs
//!
//! Records every call in order instead of touching a container engine.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::error::{Error, Result};
use crate::types::{Task, TaskId};

use super::Runtime;

// ─────────────────────────────────────────────────────────────────
// Mock Runtime Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock runtime behavior
#[derive(Debug, Clone, Default)]
pub struct MockRuntimeConfig {
    /// Simulated duration of each start/stop call (ms)
    pub latency_ms: u64,

    /// Whether to fail on certain operations
    pub fail_prepare: bool,
    pub fail_start: bool,
    pub fail_stop: bool,
}

/// A recorded runtime call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCall {
    Prepare,
    Start(TaskId),
    Stop(TaskId),
}

// ─────────────────────────────────────────────────────────────────
// Mock Runtime
// ─────────────────────────────────────────────────────────────────

/// Runtime that only records what it was asked to do
pub struct MockRuntime {
    config: MockRuntimeConfig,
    calls: Mutex<Vec<RuntimeCall>>,
}

impl MockRuntime {
    /// Create a new mock runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(MockRuntimeConfig::default())
    }

    /// Create a new mock runtime with custom configuration
    pub fn with_config(config: MockRuntimeConfig) -> Self {
        Self {
            config,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// All calls so far, in the order they were made
    #[cfg(test)]
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().clone()
    }

    /// Number of start calls made for `task_id`
    #[cfg(test)]
    pub fn start_count(&self, task_id: TaskId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| **c == RuntimeCall::Start(task_id))
            .count()
    }

    /// Number of stop calls made for `task_id`
    #[cfg(test)]
    pub fn stop_count(&self, task_id: TaskId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| **c == RuntimeCall::Stop(task_id))
            .count()
    }

    /// Wait until at least `count` calls were recorded
    #[cfg(test)]
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.calls.lock().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.calls.lock().len() >= count
    }

    fn record(&self, call: RuntimeCall) {
        self.calls.lock().push(call);
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runtime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn prepare(&self) -> Result<()> {
        self.record(RuntimeCall::Prepare);
        if self.config.fail_prepare {
            return Err(Error::runtime("mock", "engine unreachable (simulated)"));
        }
        Ok(())
    }

    async fn start(&self, task: &Task) -> Result<()> {
        self.record(RuntimeCall::Start(task.id()));
        self.simulate_latency().await;

        if self.config.fail_start {
            return Err(Error::runtime("mock", "start failed (simulated)"));
        }
        info!(task_id = %task.id(), image = %task.image(), "Mock sandbox started");
        Ok(())
    }

    async fn stop(&self, task: &Task) -> Result<()> {
        self.record(RuntimeCall::Stop(task.id()));
        self.simulate_latency().await;

        if self.config.fail_stop {
            return Err(Error::runtime("mock", "stop failed (simulated)"));
        }
        info!(task_id = %task.id(), "Mock sandbox stopped");
        Ok(())
    }
}
