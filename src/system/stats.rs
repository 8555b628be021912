//! Host stats sampling
//!
//! Periodically samples CPU and memory usage while the worker runs.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::System;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Default sampling interval
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────
// Host Stats
// ─────────────────────────────────────────────────────────────────

/// One resource usage sample
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HostStats {
    /// Average CPU utilization across cores (0-100)
    pub cpu_percent: f32,

    /// Used system memory (MB)
    pub memory_used_mb: u64,

    /// Total system memory (MB)
    pub memory_total_mb: u64,
}

/// Source of host resource samples
pub trait StatsSource: Send + Sync {
    /// Take one sample
    fn sample(&self) -> Result<HostStats>;
}

/// Stats source handle shared with the sampling loop
pub type SharedStatsSource = Arc<dyn StatsSource>;

// ─────────────────────────────────────────────────────────────────
// Sysinfo Source
// ─────────────────────────────────────────────────────────────────

/// Stats source reading the local host through `sysinfo`
pub struct SysinfoStats {
    system: Mutex<System>,
}

impl SysinfoStats {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes, so prime the first one
        system.refresh_cpu();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSource for SysinfoStats {
    fn sample(&self) -> Result<HostStats> {
        let mut system = self.system.lock();
        system.refresh_cpu();
        system.refresh_memory();

        let cpus = system.cpus();
        if cpus.is_empty() {
            return Err(Error::Stats("no CPUs reported by the host".to_string()));
        }
        let cpu_percent = cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32;

        Ok(HostStats {
            cpu_percent,
            memory_used_mb: system.used_memory() / (1024 * 1024),
            memory_total_mb: system.total_memory() / (1024 * 1024),
        })
    }
}

/// Host name for startup logs
pub fn host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Number of logical CPUs
pub fn cpu_count() -> usize {
    num_cpus::get()
}

// ─────────────────────────────────────────────────────────────────
// Sampling Loop
// ─────────────────────────────────────────────────────────────────

/// Sample `source` every `interval` until `shutdown` fires
///
/// A failed sample is logged and retried on the next tick. No sample is
/// taken once the token is cancelled.
pub async fn collect_stats(
    worker: String,
    source: SharedStatsSource,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if shutdown.is_cancelled() {
            break;
        }

        match source.sample() {
            Ok(stats) => debug!(
                worker = %worker,
                cpu_percent = stats.cpu_percent,
                memory_used_mb = stats.memory_used_mb,
                memory_total_mb = stats.memory_total_mb,
                "Host stats"
            ),
            Err(e) => error!(worker = %worker, code = %e.code(), error = %e, "Error collecting stats"),
        }
    }

    info!(worker = %worker, "Stats collection stopped");
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
