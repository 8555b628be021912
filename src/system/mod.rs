//! System module for host resource monitoring
//!
//! Provides:
//! - Host stats sources (CPU, memory)
//! - The periodic sampling loop run alongside the worker

mod stats;

pub use stats::*;
