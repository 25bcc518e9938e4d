//! Typed handler layer.
//!
//! The core queue API is bytes-only; this module adds the convenience layer
//! most callers want: a JSON codec and an adapter that turns a typed
//! `MessageHandler<T>` into a raw [`crate::app::Handler`], mapping decode
//! failures and handler errors to rejection.

pub mod codec;
pub mod handler;

pub use codec::JsonCodec;
pub use handler::{MessageHandler, TypedHandler};
