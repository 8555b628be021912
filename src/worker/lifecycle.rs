//! Worker lifecycle
//!
//! Binds the mailbox, runs the stats loop next to it and waits for a
//! termination signal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::broker::{SharedBroker, SharedHandler};
use crate::error::Result;
use crate::runtime::SharedRuntime;
use crate::system::{collect_stats, SharedStatsSource, SysinfoStats, DEFAULT_STATS_INTERVAL};

use super::{shutdown_signal, CancelledSet, Dispatcher};

/// Generate a mailbox name unique to this process
pub fn generate_worker_name() -> String {
    format!("worker-{}", Uuid::new_v4())
}

/// A worker owning exactly one mailbox
pub struct Worker {
    name: String,
    broker: SharedBroker,
    runtime: SharedRuntime,
    dispatcher: Arc<Dispatcher>,
    /// `None` samples the host through sysinfo, built when the worker starts
    stats: Option<SharedStatsSource>,
    stats_interval: Duration,
    shutdown: CancellationToken,
}

impl Worker {
    /// Create a worker with host stats sampled every five seconds
    pub fn new(name: impl Into<String>, broker: SharedBroker, runtime: SharedRuntime) -> Self {
        let name = name.into();
        let dispatcher = Arc::new(Dispatcher::new(
            name.clone(),
            runtime.clone(),
            Arc::new(CancelledSet::default()),
        ));

        Self {
            name,
            broker,
            runtime,
            dispatcher,
            stats: None,
            stats_interval: DEFAULT_STATS_INTERVAL,
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the stats source and sampling interval
    pub fn with_stats(mut self, source: SharedStatsSource, interval: Duration) -> Self {
        self.stats = Some(source);
        self.stats_interval = interval;
        self
    }

    /// Mailbox name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token cancelled when the worker shuts down
    ///
    /// Cancelling it from outside stops the worker like a signal would.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until SIGINT or SIGTERM
    pub async fn start(&self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` resolves or the shutdown token is cancelled
    ///
    /// Fails before launching anything if the runtime is unreachable or the
    /// mailbox cannot be bound.
    pub async fn run_until<F>(&self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        info!(
            worker = %self.name,
            runtime = self.runtime.name(),
            broker = self.broker.name(),
            "Starting worker"
        );

        self.runtime.prepare().await?;

        let handler: SharedHandler = self.dispatcher.clone();
        let delivery = self
            .broker
            .receive(&self.name, handler, self.shutdown.clone())
            .await?;

        let source: SharedStatsSource = match &self.stats {
            Some(source) => source.clone(),
            None => Arc::new(SysinfoStats::new()),
        };
        let stats = tokio::spawn(collect_stats(
            self.name.clone(),
            source,
            self.stats_interval,
            self.shutdown.clone(),
        ));

        info!(worker = %self.name, "Worker ready");

        tokio::select! {
            _ = signal => info!(worker = %self.name, "Shutdown signal received"),
            _ = self.shutdown.cancelled() => info!(worker = %self.name, "Shutdown requested"),
        }

        self.shutdown.cancel();

        // A start or stop already handed to the runtime runs to completion
        if let Err(e) = delivery.await {
            warn!(worker = %self.name, error = %e, "Dispatch loop ended abnormally");
        }
        if let Err(e) = stats.await {
            warn!(worker = %self.name, error = %e, "Stats loop ended abnormally");
        }

        info!(worker = %self.name, "Worker stopped");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
