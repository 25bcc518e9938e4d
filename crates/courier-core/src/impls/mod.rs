//! Implementations of the broker port.
//!
//! Only the in-memory broker lives here: it backs development and tests.
//! A real broker adapter would sit in its own crate and implement the same
//! `ports` traits.

pub mod inmem_broker;

pub use inmem_broker::{InMemoryBroker, QueueStats};
