//! Protocol module for mailbox messages
//!
//! Defines the message sum type and its JSON wire codec.

mod messages;

pub use messages::*;
