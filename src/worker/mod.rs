//! Worker module
//!
//! Handles the task lifecycle on one worker:
//! - Binding the worker's mailbox
//! - Dispatching start and cancel messages to the runtime
//! - Sampling host stats alongside dispatch
//! - Graceful shutdown on SIGINT/SIGTERM

mod cancelled;
mod dispatch;
mod lifecycle;
mod signal;

pub use cancelled::*;
pub use dispatch::*;
pub use lifecycle::*;
pub use signal::*;
