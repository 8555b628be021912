//! Runtime trait definitions
//!
//! A runtime starts and stops tasks inside an isolated execution sandbox.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Task;

/// Execution sandbox capability driven by the worker
///
/// Implementations must accept concurrent calls for distinct tasks, and a
/// `stop` for a task whose sandbox does not exist (yet or anymore) must
/// succeed.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Runtime name (e.g., "docker", "mock")
    fn name(&self) -> &'static str;

    /// Check that the sandbox engine is reachable before accepting work
    async fn prepare(&self) -> Result<()>;

    /// Launch the task's sandbox
    async fn start(&self, task: &Task) -> Result<()>;

    /// Tear down the task's sandbox; idempotent
    async fn stop(&self, task: &Task) -> Result<()>;
}

/// Runtime handle shared by the worker's loops
pub type SharedRuntime = Arc<dyn Runtime>;
