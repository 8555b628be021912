//! Message dispatch
//!
//! Turns mailbox messages into runtime calls and tracks the worker-local
//! lifecycle of the task copy each message carries.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::broker::MessageHandler;
use crate::error::{Error, Result};
use crate::protocol::Message;
use crate::runtime::SharedRuntime;
use crate::types::{Task, TaskState};

use super::CancelledSet;

/// Handler bound to a worker's mailbox
pub struct Dispatcher {
    worker: String,
    runtime: SharedRuntime,
    cancelled: Arc<CancelledSet>,
}

impl Dispatcher {
    pub fn new(worker: impl Into<String>, runtime: SharedRuntime, cancelled: Arc<CancelledSet>) -> Self {
        Self {
            worker: worker.into(),
            runtime,
            cancelled,
        }
    }

    /// Route one message to the matching lifecycle action
    pub async fn handle_message(&self, message: Message) -> Result<()> {
        debug!(worker = %self.worker, kind = message.kind(), task_id = %message.task_id(), "Dispatching message");

        match message {
            Message::Start { task } => self.start_task(task).await,
            Message::Cancel(request) => self.stop_task(request.task).await,
        }
    }

    /// Start a `Scheduled` task
    ///
    /// Any other state is rejected without touching the runtime. A task
    /// cancelled before its start arrived is marked `Cancelled` instead.
    pub async fn start_task(&self, mut task: Task) -> Result<()> {
        if task.state() != TaskState::Scheduled {
            return Err(Error::InvalidStateTransition {
                task_id: task.id(),
                from: task.state(),
                to: TaskState::Running,
            });
        }

        if self.cancelled.contains(&task.id()) {
            task.transition(TaskState::Cancelled)?;
            info!(
                worker = %self.worker,
                task_id = %task.id(),
                state = %task.state(),
                "Task was cancelled before it started, skipping"
            );
            return Ok(());
        }

        info!(
            worker = %self.worker,
            task_id = %task.id(),
            task_name = %task.name(),
            image = %task.image(),
            "Starting task"
        );

        match self.runtime.start(&task).await {
            Ok(()) => {
                task.transition(TaskState::Running)?;
                info!(worker = %self.worker, task_id = %task.id(), state = %task.state(), "Task started");
                Ok(())
            }
            Err(e) => {
                task.transition(TaskState::Failed)?;
                warn!(
                    worker = %self.worker,
                    task_id = %task.id(),
                    state = %task.state(),
                    error = %e,
                    "Task failed to start"
                );
                Err(Error::TaskStart {
                    task_id: task.id(),
                    source: Box::new(e),
                })
            }
        }
    }

    /// Stop a task
    ///
    /// The runtime is always asked to stop, whether or not a start for this
    /// task was ever seen here.
    pub async fn stop_task(&self, mut task: Task) -> Result<()> {
        self.cancelled.insert(task.id());
        info!(worker = %self.worker, task_id = %task.id(), "Cancelling task");

        match self.runtime.stop(&task).await {
            Ok(()) => {
                if task.state().can_transition_to(TaskState::Cancelled) {
                    task.transition(TaskState::Cancelled)?;
                }
                info!(worker = %self.worker, task_id = %task.id(), state = %task.state(), "Task stopped");
                Ok(())
            }
            Err(e) => {
                error!(worker = %self.worker, task_id = %task.id(), error = %e, "Error stopping task");
                Err(Error::TaskStop {
                    task_id: task.id(),
                    source: Box::new(e),
                })
            }
        }
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle(&self, message: Message) -> Result<()> {
        self.handle_message(message).await
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
