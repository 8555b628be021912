//! Type definitions for the Tork worker
//!
//! Task identity, lifecycle state and the cancellation request wrapper.

mod task;

pub use task::*;
