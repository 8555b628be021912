//! Submission of JSON-lines message batches
//!
//! Tasks are reset to `Pending` and handed to the scheduler; cancels go
//! straight to the worker's mailbox. Bad lines are logged and skipped.

use tracing::{info, warn};

use crate::broker::Broker;
use crate::protocol::{decode_lines, Message};

use super::Scheduler;

/// Outcome counts of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    pub scheduled: usize,
    pub cancelled: usize,
    pub failed: usize,
}

/// Submit every message in `input`
pub async fn submit_messages(
    input: &str,
    scheduler: &dyn Scheduler,
    broker: &dyn Broker,
    worker: &str,
) -> SubmitSummary {
    let mut summary = SubmitSummary::default();

    for (line, decoded) in decode_lines(input) {
        let message = match decoded {
            Ok(message) => message,
            Err(e) => {
                warn!(line, code = %e.code(), error = %e, "Skipping undecodable message");
                summary.failed += 1;
                continue;
            }
        };

        let task_id = message.task_id();
        let result = match message {
            Message::Start { task } => scheduler
                .schedule(task.submitted())
                .await
                .map(|()| &mut summary.scheduled),
            cancel @ Message::Cancel(_) => broker
                .send(worker, cancel)
                .await
                .map(|()| &mut summary.cancelled),
        };

        match result {
            Ok(counter) => *counter += 1,
            Err(e) => {
                warn!(
                    line,
                    task_id = %task_id,
                    code = %e.code(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Submission failed"
                );
                summary.failed += 1;
            }
        }
    }

    info!(
        scheduled = summary.scheduled,
        cancelled = summary.cancelled,
        failed = summary.failed,
        "Submission finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::broker::InMemoryBroker;
    use crate::protocol::encode;
    use crate::scheduler::RoundRobinScheduler;
    use crate::types::{Task, TaskState};

    #[tokio::test]
    async fn test_submit_mixed_batch() {
        let broker = Arc::new(InMemoryBroker::new());
        let scheduler = RoundRobinScheduler::new(broker.clone(), vec!["w1".to_string()]);

        // Submitter-provided state is discarded at the boundary
        let mut task = Task::new("pg", "postgres:13");
        task.transition(TaskState::Scheduled).unwrap();

        let input = format!(
            "# batch\n{}\n\n{}\n{{\"kind\":\"reboot\"}}\nnot json\n",
            encode(&Message::start(task.clone())).unwrap(),
            encode(&Message::cancel(task)).unwrap(),
        );

        let summary = submit_messages(&input, &scheduler, broker.as_ref(), "w1").await;
        assert_eq!(
            summary,
            SubmitSummary {
                scheduled: 1,
                cancelled: 1,
                failed: 2,
            }
        );
        assert_eq!(broker.pending("w1"), 2);
    }

    #[tokio::test]
    async fn test_submit_failure_counted() {
        let broker = Arc::new(InMemoryBroker::new());
        let scheduler = RoundRobinScheduler::new(broker.clone(), Vec::new());
        let input = encode(&Message::start(Task::new("pg", "postgres:13"))).unwrap();

        let summary = submit_messages(&input, &scheduler, broker.as_ref(), "w1").await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.scheduled, 0);
    }
}
