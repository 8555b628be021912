//! Mailbox message definitions
//!
//! Messages are serialized as JSON with a `kind` discriminator. Inside the
//! process they are a closed sum type; only the decoding boundary can see a
//! kind it does not know.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{CancelRequest, Task, TaskId};

/// Tags accepted by [`decode`]
pub const KNOWN_KINDS: &[&str] = &["task", "cancel"];

// ─────────────────────────────────────────────────────────────────
// Message Types (Discriminated Union)
// ─────────────────────────────────────────────────────────────────

/// Everything a worker mailbox can carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Message {
    /// Start this task
    #[serde(rename = "task")]
    Start { task: Task },

    /// Stop this task
    #[serde(rename = "cancel")]
    Cancel(CancelRequest),
}

impl Message {
    /// Wrap a task to be started
    pub fn start(task: Task) -> Self {
        Message::Start { task }
    }

    /// Wrap a snapshot of a task to be cancelled
    pub fn cancel(task: Task) -> Self {
        Message::Cancel(CancelRequest::new(task))
    }

    /// Wire tag of this message
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Start { .. } => "task",
            Message::Cancel(_) => "cancel",
        }
    }

    /// ID of the task the message refers to
    pub fn task_id(&self) -> TaskId {
        match self {
            Message::Start { task } => task.id(),
            Message::Cancel(req) => req.task_id(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Codec
// ─────────────────────────────────────────────────────────────────

/// Serialize a message to its JSON wire form
#[cfg(test)]
pub fn encode(message: &Message) -> Result<String> {
    serde_json::to_string(message)
        .map_err(|e| Error::Internal(format!("Failed to encode message: {}", e)))
}

/// Decode one JSON message
///
/// The tag is checked before the body so an unrecognised kind is reported by
/// name instead of as a generic parse failure.
pub fn decode(input: &str) -> Result<Message> {
    let value: Value = serde_json::from_str(input).map_err(|e| Error::malformed(e.to_string()))?;

    let kind = value
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::malformed("missing \"kind\" tag"))?;

    if !KNOWN_KINDS.contains(&kind) {
        return Err(Error::UnknownMessageKind {
            kind: kind.to_string(),
        });
    }

    serde_json::from_value(value).map_err(|e| Error::malformed(e.to_string()))
}

/// Decode a JSON-lines batch
///
/// Blank lines and lines starting with `#` are skipped. Each entry carries
/// its 1-based line number.
pub fn decode_lines(input: &str) -> Vec<(usize, Result<Message>)> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| (idx + 1, decode(line)))
        .collect()
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
