//! Runtime backends
//!
//! The capability the worker uses to run tasks in isolation, plus the
//! Docker and mock implementations.

mod docker;
mod mock;
mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use docker::DockerRuntime;
pub use mock::{MockRuntime, MockRuntimeConfig, RuntimeCall};
pub use traits::*;

use crate::config::{RuntimeKind, RuntimeSettings};

/// Build the runtime selected by configuration
pub fn create_runtime(settings: &RuntimeSettings) -> SharedRuntime {
    match settings.kind {
        RuntimeKind::Docker => Arc::new(DockerRuntime::new(
            settings.docker_binary.clone(),
            Duration::from_secs(settings.stop_timeout_secs),
        )),
        RuntimeKind::Mock => Arc::new(MockRuntime::new()),
    }
}
