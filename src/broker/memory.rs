//! In-process broker
//!
//! One bounded FIFO channel per destination. The receiving half is handed to
//! a dispatch task when a handler binds; until then messages queue up to the
//! mailbox capacity.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::error::{Error, Result};
use crate::protocol::Message;

use super::{Broker, SharedHandler};

/// Default number of undelivered messages a mailbox holds
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// Largest mailbox capacity accepted; larger requests are clamped
pub const MAX_MAILBOX_CAPACITY: usize = 1 << 20;

// ─────────────────────────────────────────────────────────────────
// Mailbox
// ─────────────────────────────────────────────────────────────────

struct Mailbox {
    tx: mpsc::Sender<Message>,
    /// Taken by the first receiver; `None` means the mailbox is bound
    rx: Option<mpsc::Receiver<Message>>,
}

impl Mailbox {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self { tx, rx: Some(rx) }
    }
}

// ─────────────────────────────────────────────────────────────────
// In-Memory Broker
// ─────────────────────────────────────────────────────────────────

/// Broker keeping every mailbox inside the current process
pub struct InMemoryBroker {
    mailboxes: Mutex<HashMap<String, Mailbox>>,
    capacity: usize,
    closed: CancellationToken,
}

impl InMemoryBroker {
    /// Create a broker with the default mailbox capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAILBOX_CAPACITY)
    }

    /// Create a broker whose mailboxes hold at most `capacity` messages
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mailboxes: Mutex::new(HashMap::new()),
            capacity: capacity.clamp(1, MAX_MAILBOX_CAPACITY),
            closed: CancellationToken::new(),
        }
    }

    /// Shut the transport down
    ///
    /// Later sends and bindings fail with `BrokerUnavailable` and every
    /// dispatch loop stops after its current message.
    pub fn shutdown(&self) {
        info!("Shutting down in-memory broker");
        self.closed.cancel();
    }

    /// Whether a receiver is bound to `destination`
    pub fn is_bound(&self, destination: &str) -> bool {
        self.mailboxes
            .lock()
            .get(destination)
            .map(|m| m.rx.is_none())
            .unwrap_or(false)
    }

    /// Number of messages waiting in `destination`
    pub fn pending(&self, destination: &str) -> usize {
        self.mailboxes
            .lock()
            .get(destination)
            .map(|m| m.tx.max_capacity() - m.tx.capacity())
            .unwrap_or(0)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    fn name(&self) -> &'static str {
        "inmemory"
    }

    async fn send(&self, destination: &str, message: Message) -> Result<()> {
        if destination.is_empty() {
            return Err(Error::InvalidDestination);
        }
        if self.closed.is_cancelled() {
            return Err(Error::BrokerUnavailable);
        }

        let kind = message.kind();
        let task_id = message.task_id();

        let mut mailboxes = self.mailboxes.lock();
        let mailbox = mailboxes
            .entry(destination.to_string())
            .or_insert_with(|| Mailbox::new(self.capacity));

        match mailbox.tx.try_send(message) {
            Ok(()) => {
                trace!(destination = %destination, kind, task_id = %task_id, "Message enqueued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(Error::MailboxFull {
                destination: destination.to_string(),
                capacity: self.capacity,
            }),
            // The dispatch loop has exited and dropped its receiver
            Err(TrySendError::Closed(_)) => Err(Error::BrokerUnavailable),
        }
    }

    async fn receive(
        &self,
        destination: &str,
        handler: SharedHandler,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        if destination.is_empty() {
            return Err(Error::InvalidDestination);
        }
        if self.closed.is_cancelled() {
            return Err(Error::BrokerUnavailable);
        }

        let rx = {
            let mut mailboxes = self.mailboxes.lock();
            let mailbox = mailboxes
                .entry(destination.to_string())
                .or_insert_with(|| Mailbox::new(self.capacity));
            mailbox.rx.take().ok_or_else(|| Error::DestinationAlreadyBound {
                destination: destination.to_string(),
            })?
        };

        info!(destination = %destination, "Mailbox bound");

        Ok(tokio::spawn(dispatch_loop(
            destination.to_string(),
            rx,
            handler,
            shutdown,
            self.closed.clone(),
        )))
    }
}

// ─────────────────────────────────────────────────────────────────
// Dispatch Loop
// ─────────────────────────────────────────────────────────────────

/// Deliver messages one at a time until shutdown
async fn dispatch_loop(
    destination: String,
    mut rx: mpsc::Receiver<Message>,
    handler: SharedHandler,
    shutdown: CancellationToken,
    closed: CancellationToken,
) {
    loop {
        // Shutdown wins over a ready message
        let message = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = closed.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let kind = message.kind();
        let task_id = message.task_id();
        debug!(destination = %destination, kind, task_id = %task_id, "Delivering message");

        if let Err(e) = handler.handle(message).await {
            error!(
                destination = %destination,
                kind,
                task_id = %task_id,
                code = %e.code(),
                retryable = e.is_retryable(),
                error = %e,
                "Message handler failed"
            );
        }
    }

    info!(destination = %destination, "Mailbox dispatch loop stopped");
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::{timeout, Instant};

    use crate::broker::MessageHandler;
    use crate::types::{Task, TaskId};

    /// Forwards every delivered message to a channel, optionally slowly
    struct ChannelHandler {
        tx: mpsc::UnboundedSender<Message>,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl MessageHandler for ChannelHandler {
        async fn handle(&self, message: Message) -> Result<()> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let _ = self.tx.send(message);
            if self.fail {
                return Err(Error::Internal("handler failure".to_string()));
            }
            Ok(())
        }
    }

    fn channel_handler(delay: Duration, fail: bool) -> (SharedHandler, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelHandler { tx, delay, fail }), rx)
    }

    fn task_message() -> Message {
        Message::start(Task::new("t", "alpine:3"))
    }

    async fn next_id(rx: &mut UnboundedReceiver<Message>) -> TaskId {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("delivery timed out")
            .expect("handler channel closed")
            .task_id()
    }

    #[tokio::test]
    async fn test_delivery_preserves_send_order() {
        let broker = InMemoryBroker::new();
        let (handler, mut rx) = channel_handler(Duration::ZERO, false);
        broker.receive("w1", handler, CancellationToken::new()).await.unwrap();

        let messages: Vec<Message> = (0..50).map(|_| task_message()).collect();
        let sent: Vec<TaskId> = messages.iter().map(Message::task_id).collect();
        for message in messages {
            broker.send("w1", message).await.unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..sent.len() {
            received.push(next_id(&mut rx).await);
        }
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_messages_held_until_receiver_binds() {
        let broker = InMemoryBroker::new();
        let first = task_message();
        let second = task_message();
        let expected = vec![first.task_id(), second.task_id()];
        broker.send("late", first).await.unwrap();
        broker.send("late", second).await.unwrap();
        assert_eq!(broker.pending("late"), 2);

        let (handler, mut rx) = channel_handler(Duration::ZERO, false);
        broker.receive("late", handler, CancellationToken::new()).await.unwrap();

        assert_eq!(vec![next_id(&mut rx).await, next_id(&mut rx).await], expected);
    }

    #[tokio::test]
    async fn test_second_binding_fails_and_first_keeps_receiving() {
        let broker = InMemoryBroker::new();
        let (first, mut first_rx) = channel_handler(Duration::ZERO, false);
        let (second, mut second_rx) = channel_handler(Duration::ZERO, false);

        broker.receive("w1", first, CancellationToken::new()).await.unwrap();
        let err = broker
            .receive("w1", second, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DestinationAlreadyBound { ref destination } if destination == "w1"));
        assert!(broker.is_bound("w1"));

        let message = task_message();
        let id = message.task_id();
        broker.send("w1", message).await.unwrap();
        assert_eq!(next_id(&mut first_rx).await, id);
        assert!(second_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_destination_is_invalid() {
        let broker = InMemoryBroker::new();
        assert!(matches!(
            broker.send("", task_message()).await,
            Err(Error::InvalidDestination)
        ));
        let (handler, _rx) = channel_handler(Duration::ZERO, false);
        assert!(matches!(
            broker.receive("", handler, CancellationToken::new()).await,
            Err(Error::InvalidDestination)
        ));
    }

    #[tokio::test]
    async fn test_full_mailbox_rejects_instead_of_dropping() {
        let broker = InMemoryBroker::with_capacity(2);
        broker.send("w1", task_message()).await.unwrap();
        broker.send("w1", task_message()).await.unwrap();

        let err = broker.send("w1", task_message()).await.unwrap_err();
        assert!(matches!(err, Error::MailboxFull { capacity: 2, .. }));
        assert_eq!(broker.pending("w1"), 2);
    }

    #[tokio::test]
    async fn test_oversized_capacity_is_clamped() {
        let broker = InMemoryBroker::with_capacity(usize::MAX);
        broker.send("w1", task_message()).await.unwrap();
        assert_eq!(broker.pending("w1"), 1);

        let (handler, mut rx) = channel_handler(Duration::ZERO, false);
        broker.receive("w1", handler, CancellationToken::new()).await.unwrap();
        next_id(&mut rx).await;

        let broker = InMemoryBroker::with_capacity(0);
        broker.send("w1", task_message()).await.unwrap();
        assert!(matches!(
            broker.send("w1", task_message()).await,
            Err(Error::MailboxFull { capacity: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_makes_broker_unavailable() {
        let broker = InMemoryBroker::new();
        broker.shutdown();
        assert!(matches!(
            broker.send("w1", task_message()).await,
            Err(Error::BrokerUnavailable)
        ));
        let (handler, _rx) = channel_handler(Duration::ZERO, false);
        assert!(matches!(
            broker.receive("w1", handler, CancellationToken::new()).await,
            Err(Error::BrokerUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_delivery() {
        let broker = InMemoryBroker::new();
        let (handler, mut rx) = channel_handler(Duration::ZERO, true);
        broker.receive("w1", handler, CancellationToken::new()).await.unwrap();

        let a = task_message();
        let b = task_message();
        let ids = vec![a.task_id(), b.task_id()];
        broker.send("w1", a).await.unwrap();
        broker.send("w1", b).await.unwrap();

        assert_eq!(vec![next_id(&mut rx).await, next_id(&mut rx).await], ids);
    }

    #[tokio::test]
    async fn test_no_delivery_after_shutdown_token() {
        let broker = InMemoryBroker::new();
        let shutdown = CancellationToken::new();
        let (handler, mut rx) = channel_handler(Duration::ZERO, false);
        broker.receive("w1", handler, shutdown.clone()).await.unwrap();

        let first = task_message();
        let id = first.task_id();
        broker.send("w1", first).await.unwrap();
        assert_eq!(next_id(&mut rx).await, id);

        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The receiver is gone, so the mailbox no longer accepts work
        assert!(broker.send("w1", task_message()).await.is_err());
        assert!(timeout(Duration::from_millis(200), rx.recv()).await.ok().flatten().is_none());
        assert!(broker.is_bound("w1"));
    }

    #[tokio::test]
    async fn test_in_flight_handler_finishes_on_shutdown() {
        let broker = InMemoryBroker::new();
        let shutdown = CancellationToken::new();
        let (handler, mut rx) = channel_handler(Duration::from_millis(200), false);
        let delivery = broker.receive("w1", handler, shutdown.clone()).await.unwrap();

        let message = task_message();
        let id = message.task_id();
        broker.send("w1", message).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();

        // The loop only resolves after the handler has returned
        timeout(Duration::from_secs(2), delivery).await.unwrap().unwrap();
        assert_eq!(rx.try_recv().map(|m| m.task_id()).ok(), Some(id));
    }

    #[tokio::test]
    async fn test_slow_destination_does_not_block_others() {
        let broker = Arc::new(InMemoryBroker::new());
        let (slow, _slow_rx) = channel_handler(Duration::from_secs(2), false);
        let (fast, mut fast_rx) = channel_handler(Duration::ZERO, false);
        broker.receive("slow", slow, CancellationToken::new()).await.unwrap();
        broker.receive("fast", fast, CancellationToken::new()).await.unwrap();

        broker.send("slow", task_message()).await.unwrap();

        let started = Instant::now();
        let slow_send = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.send("slow", task_message()).await })
        };
        let fast_message = task_message();
        let fast_id = fast_message.task_id();
        broker.send("fast", fast_message).await.unwrap();

        assert_eq!(next_id(&mut fast_rx).await, fast_id);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(slow_send.await.unwrap().is_ok());
    }
}
