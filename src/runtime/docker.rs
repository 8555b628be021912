//! Docker runtime
//!
//! Drives the `docker` CLI. Each task gets one detached container named
//! after its identifier, so stop can find it without any local bookkeeping.

use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::Task;

use super::Runtime;

const RUNTIME_NAME: &str = "docker";

/// Prefix shared by every container this worker creates
pub const CONTAINER_PREFIX: &str = "tork-";

/// Runtime backed by the Docker command line client
pub struct DockerRuntime {
    binary: String,
    stop_timeout: Duration,
}

impl DockerRuntime {
    /// Create a runtime calling `binary` (usually "docker")
    pub fn new(binary: impl Into<String>, stop_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            stop_timeout,
        }
    }

    /// Container name used for a task
    pub fn container_name(task: &Task) -> String {
        format!("{}{}", CONTAINER_PREFIX, task.id())
    }

    /// Arguments for `docker run`
    fn run_args(task: &Task) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            Self::container_name(task),
            "--label".to_string(),
            format!("tork.task-id={}", task.id()),
            "--label".to_string(),
            format!("tork.task-name={}", task.name()),
        ];
        for entry in task.env() {
            args.push("-e".to_string());
            args.push(entry.clone());
        }
        args.push(task.image().to_string());
        args
    }

    /// Arguments for `docker rm`
    fn rm_args(task: &Task) -> Vec<String> {
        vec!["rm".to_string(), "-f".to_string(), Self::container_name(task)]
    }

    async fn exec(&self, args: &[String]) -> Result<Output> {
        debug!(binary = %self.binary, args = ?args, "Running container engine command");
        Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::runtime(RUNTIME_NAME, format!("failed to run '{}': {}", self.binary, e)))
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker", Duration::from_secs(10))
    }
}

/// Whether `docker rm` failed only because the container is already gone
fn is_missing_container(stderr: &str) -> bool {
    stderr.contains("No such container")
}

fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}

#[async_trait]
impl Runtime for DockerRuntime {
    fn name(&self) -> &'static str {
        RUNTIME_NAME
    }

    async fn prepare(&self) -> Result<()> {
        let output = self
            .exec(&["version".to_string(), "--format".to_string(), "{{.Server.Version}}".to_string()])
            .await?;

        if !output.status.success() {
            return Err(Error::runtime(RUNTIME_NAME, stderr_message(&output)));
        }

        let server = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(server_version = %server, "Docker engine reachable");
        Ok(())
    }

    async fn start(&self, task: &Task) -> Result<()> {
        let output = self.exec(&Self::run_args(task)).await?;

        if !output.status.success() {
            return Err(Error::runtime(RUNTIME_NAME, stderr_message(&output)));
        }

        let container = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(task_id = %task.id(), container = %container, "Container started");
        Ok(())
    }

    async fn stop(&self, task: &Task) -> Result<()> {
        let output = tokio::time::timeout(self.stop_timeout, self.exec(&Self::rm_args(task)))
            .await
            .map_err(|_| {
                Error::runtime(
                    RUNTIME_NAME,
                    format!("container removal timed out after {:?}", self.stop_timeout),
                )
            })??;

        if output.status.success() {
            return Ok(());
        }

        let message = stderr_message(&output);
        if is_missing_container(&message) {
            warn!(task_id = %task.id(), "No container to remove");
            return Ok(());
        }

        Err(Error::runtime(RUNTIME_NAME, message))
    }
}
