//! Task type definitions
//!
//! A task carries an immutable identity and execution parameters plus a
//! single mutable lifecycle state. Tasks travel by value: every hop through
//! the broker owns an independent copy.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Task ID
// ─────────────────────────────────────────────────────────────────

/// Globally unique task identifier, assigned once at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Task State
// ─────────────────────────────────────────────────────────────────

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Created by the submitter, not yet placed on a worker
    #[default]
    Pending,
    /// Delivered (or about to be) to exactly one worker's mailbox
    Scheduled,
    /// Running inside the runtime sandbox
    Running,
    /// Finished successfully
    Completed,
    /// Failed to start or exited with an error
    Failed,
    /// Stopped on request
    Cancelled,
}

impl TaskState {
    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;

        matches!(
            (self, next),
            (Pending, Scheduled)
                | (Scheduled, Running)
                | (Scheduled, Failed)
                | (Scheduled, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "PENDING"),
            TaskState::Scheduled => write!(f, "SCHEDULED"),
            TaskState::Running => write!(f, "RUNNING"),
            TaskState::Completed => write!(f, "COMPLETED"),
            TaskState::Failed => write!(f, "FAILED"),
            TaskState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────

/// A unit of work executed inside a runtime sandbox
///
/// Identity and execution parameters are fixed at construction; only
/// `state` changes, and only through [`Task::transition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,

    #[serde(default)]
    name: String,

    image: String,

    #[serde(default)]
    env: Vec<String>,

    #[serde(default)]
    state: TaskState,
}

impl Task {
    /// Create a new task in `Pending` state with a fresh identifier
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            image: image.into(),
            env: Vec::new(),
            state: TaskState::Pending,
        }
    }

    /// Set the environment (`KEY=VALUE` entries) at construction time
    pub fn with_env<I, S>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env = env.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn env(&self) -> &[String] {
        &self.env
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Move the task to `next`, rejecting transitions the lifecycle forbids
    pub fn transition(&mut self, next: TaskState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidStateTransition {
                task_id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Normalize a task received at the submission boundary to `Pending`
    ///
    /// Whatever state the submitter sent is discarded; the submission layer
    /// owns the task until the scheduler takes it.
    pub fn submitted(mut self) -> Self {
        self.state = TaskState::Pending;
        self
    }
}

// ─────────────────────────────────────────────────────────────────
// Cancel Request
// ─────────────────────────────────────────────────────────────────

/// Request to stop a previously dispatched task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    /// Snapshot of the task at the moment cancellation was requested
    pub task: Task,

    /// When cancellation was requested
    #[serde(default = "Utc::now")]
    pub requested_at: DateTime<Utc>,
}

impl CancelRequest {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            requested_at: Utc::now(),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending_with_unique_id() {
        let a = Task::new("a", "alpine:3");
        let b = Task::new("b", "alpine:3");
        assert_eq!(a.state(), TaskState::Pending);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut task = Task::new("pg", "postgres:13");
        task.transition(TaskState::Scheduled).unwrap();
        task.transition(TaskState::Running).unwrap();
        task.transition(TaskState::Completed).unwrap();
        assert!(task.state().is_terminal());
    }

    #[test]
    fn test_cancel_before_start_is_legal() {
        let mut task = Task::new("pg", "postgres:13");
        task.transition(TaskState::Scheduled).unwrap();
        assert!(task.transition(TaskState::Cancelled).is_ok());
    }

    #[test]
    fn test_start_failure_skips_running() {
        let mut task = Task::new("pg", "postgres:13");
        task.transition(TaskState::Scheduled).unwrap();
        assert!(task.transition(TaskState::Failed).is_ok());
    }

    #[test]
    fn test_illegal_transition_is_rejected_and_state_kept() {
        let mut task = Task::new("pg", "postgres:13");
        let err = task.transition(TaskState::Running).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidStateTransition {
                from: TaskState::Pending,
                to: TaskState::Running,
                ..
            }
        ));
        assert_eq!(task.state(), TaskState::Pending);
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        use TaskState::*;
        for terminal in [Completed, Failed, Cancelled] {
            for next in [Pending, Scheduled, Running, Completed, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_submitted_resets_state() {
        let mut task = Task::new("pg", "postgres:13");
        task.transition(TaskState::Scheduled).unwrap();
        let id = task.id();
        let task = task.submitted();
        assert_eq!(task.state(), TaskState::Pending);
        assert_eq!(task.id(), id);
    }

    #[test]
    fn test_task_json_shape() {
        let task = Task::new("pg", "postgres:13").with_env(["POSTGRES_USER=cube"]);
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["state"], "PENDING");
        assert_eq!(value["image"], "postgres:13");
        assert_eq!(value["env"][0], "POSTGRES_USER=cube");
        assert_eq!(value["id"], task.id().to_string());
    }

    #[test]
    fn test_task_id_parse() {
        let id = TaskId::new();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<TaskId>().is_err());
    }
}
