//! courier-core
//!
//! Core building blocks for a reliable-queue client/worker framework:
//! the delivery substrate that a message pipeline (ingestor -> queue ->
//! processor) sits on top of.
//!
//! # Module layout
//! - **domain**: configuration, identifiers, connection state machine,
//!   handler outcome, and the error taxonomy.
//! - **ports**: the broker abstraction ([`ports::Connector`],
//!   [`ports::Connection`], [`ports::Delivery`]), the seam where a real
//!   broker client plugs in.
//! - **app**: application loops (connection manager with backoff, publisher
//!   and publish loop, consumer worker loop, shutdown controller).
//! - **typed**: typed handler layer over the raw byte-payload API
//!   (JSON codec + `TypedHandler` adapter).
//! - **impls**: in-memory broker for development and tests.

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;
