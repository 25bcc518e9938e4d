//! Ports - the broker abstraction.
//!
//! These traits are the seam between the framework and a concrete broker
//! client. The in-memory implementation in `impls` backs development and
//! tests; a real AMQP adapter would implement the same traits.

pub mod broker;

pub use broker::{Connection, Connector, Delivery};
