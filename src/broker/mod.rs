//! Broker module for mailbox delivery
//!
//! Provides the transport-agnostic broker abstraction and an in-process
//! implementation.

mod memory;
mod traits;

pub use memory::{InMemoryBroker, MAX_MAILBOX_CAPACITY};
pub use traits::*;
