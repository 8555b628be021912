//! Broker trait definitions
//!
//! A broker delivers messages to named mailboxes. The contract holds for any
//! transport: per-destination FIFO delivery, a single receiver per
//! destination, and a `send` that reports backpressure instead of blocking.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::protocol::Message;

// ─────────────────────────────────────────────────────────────────
// Message Handler
// ─────────────────────────────────────────────────────────────────

/// Consumer bound to a mailbox
///
/// Invoked once per delivered message, never concurrently for the same
/// mailbox. A returned error is logged by the dispatch loop and delivery
/// continues with the next message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message) -> Result<()>;
}

/// Type alias for a shared handler reference
pub type SharedHandler = Arc<dyn MessageHandler>;

// ─────────────────────────────────────────────────────────────────
// Broker Trait
// ─────────────────────────────────────────────────────────────────

/// Named-mailbox message delivery
#[async_trait]
pub trait Broker: Send + Sync {
    /// Get the broker name (e.g., "inmemory")
    fn name(&self) -> &'static str;

    /// Enqueue `message` for `destination`
    ///
    /// Fails with `InvalidDestination` for an empty name, `BrokerUnavailable`
    /// once the transport is shut down, and `MailboxFull` when the mailbox is
    /// at capacity. Messages for a destination without a receiver are held
    /// until one binds.
    async fn send(&self, destination: &str, message: Message) -> Result<()>;

    /// Bind `handler` as the sole consumer of `destination`
    ///
    /// Fails with `DestinationAlreadyBound` if a receiver already exists.
    /// Delivery runs in the background until `shutdown` is cancelled; an
    /// in-flight handler call is allowed to finish, no later message is
    /// delivered. The returned handle resolves once delivery has stopped.
    async fn receive(
        &self,
        destination: &str,
        handler: SharedHandler,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>>;
}

/// Type alias for a shared broker reference
pub type SharedBroker = Arc<dyn Broker>;
