//! Task scheduling
//!
//! A scheduler takes a freshly submitted `Pending` task, marks it
//! `Scheduled` and hands it to exactly one worker mailbox.

mod submit;

pub use submit::*;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::broker::SharedBroker;
use crate::error::{Error, Result};
use crate::protocol::Message;
use crate::types::{Task, TaskState};

/// Places pending tasks on workers
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Deliver `task` to one worker
    ///
    /// On success the task was enqueued as `Scheduled`; on failure it was
    /// not delivered anywhere.
    async fn schedule(&self, task: Task) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────
// Round Robin
// ─────────────────────────────────────────────────────────────────

/// Cycles through a fixed list of worker mailboxes
pub struct RoundRobinScheduler {
    broker: SharedBroker,
    mailboxes: Vec<String>,
    next: AtomicUsize,
}

impl RoundRobinScheduler {
    pub fn new(broker: SharedBroker, mailboxes: Vec<String>) -> Self {
        Self {
            broker,
            mailboxes,
            next: AtomicUsize::new(0),
        }
    }

    fn pick(&self) -> Option<&str> {
        if self.mailboxes.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.mailboxes.len();
        Some(&self.mailboxes[index])
    }
}

#[async_trait]
impl Scheduler for RoundRobinScheduler {
    async fn schedule(&self, mut task: Task) -> Result<()> {
        if task.state() != TaskState::Pending {
            return Err(Error::InvalidStateTransition {
                task_id: task.id(),
                from: task.state(),
                to: TaskState::Scheduled,
            });
        }

        let destination = self
            .pick()
            .ok_or(Error::NoWorkersAvailable { task_id: task.id() })?
            .to_string();

        task.transition(TaskState::Scheduled)?;
        let task_id = task.id();
        debug!(task_id = %task_id, destination = %destination, "Scheduling task");

        self.broker.send(&destination, Message::start(task)).await?;

        info!(task_id = %task_id, worker = %destination, "Task scheduled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::broker::{Broker, InMemoryBroker};

    #[tokio::test]
    async fn test_schedules_pending_task_as_scheduled() {
        let broker = Arc::new(InMemoryBroker::new());
        let scheduler = RoundRobinScheduler::new(broker.clone(), vec!["w1".to_string()]);

        scheduler.schedule(Task::new("t", "alpine:3")).await.unwrap();
        assert_eq!(broker.pending("w1"), 1);
    }

    #[tokio::test]
    async fn test_rejects_non_pending_task() {
        let broker = Arc::new(InMemoryBroker::new());
        let scheduler = RoundRobinScheduler::new(broker.clone(), vec!["w1".to_string()]);

        let mut task = Task::new("t", "alpine:3");
        task.transition(TaskState::Scheduled).unwrap();

        let err = scheduler.schedule(task).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidStateTransition { from: TaskState::Scheduled, .. }
        ));
        assert_eq!(broker.pending("w1"), 0);
    }

    #[tokio::test]
    async fn test_no_workers() {
        let broker: SharedBroker = Arc::new(InMemoryBroker::new());
        let scheduler = RoundRobinScheduler::new(broker, Vec::new());

        let err = scheduler.schedule(Task::new("t", "alpine:3")).await.unwrap_err();
        assert!(matches!(err, Error::NoWorkersAvailable { .. }));
    }

    #[tokio::test]
    async fn test_round_robin_across_mailboxes() {
        let broker = Arc::new(InMemoryBroker::new());
        let scheduler = RoundRobinScheduler::new(
            broker.clone(),
            vec!["w1".to_string(), "w2".to_string()],
        );

        for _ in 0..4 {
            scheduler.schedule(Task::new("t", "alpine:3")).await.unwrap();
        }
        assert_eq!(broker.pending("w1"), 2);
        assert_eq!(broker.pending("w2"), 2);
    }

    #[tokio::test]
    async fn test_send_failure_is_returned() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.shutdown();
        let scheduler = RoundRobinScheduler::new(broker.clone(), vec!["w1".to_string()]);

        let err = scheduler.schedule(Task::new("t", "alpine:3")).await.unwrap_err();
        assert!(matches!(err, Error::BrokerUnavailable));
        assert_eq!(broker.name(), "inmemory");
    }
}
