//! Error taxonomy for the delivery substrate.
//!
//! The taxonomy matters more than the variants: connect-time failures are
//! transient and retried forever by the connection manager; everything after
//! the connection is established surfaces to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CourierError {
    /// Connect-time failure. Never terminal: the connection manager retries
    /// these with backoff and never surfaces them as fatal.
    #[error("broker unreachable: {0}")]
    Unreachable(String),

    /// Operation attempted on a connection that has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Queue redeclared with different properties than it was created with.
    #[error("queue '{name}' already exists with different properties")]
    QueueMismatch { name: String },

    /// Operation on a queue nobody declared.
    #[error("queue '{0}' is not declared")]
    QueueNotFound(String),

    /// Publish failed after the connection was established. Surfaced to the
    /// caller, never retried by the core: a publish failure may indicate a
    /// logic error, and blind retry could duplicate.
    #[error("publish to queue '{queue}' failed: {reason}")]
    PublishFailed { queue: String, reason: String },

    /// Payload could not be serialized.
    #[error("payload encode failed: {0}")]
    Encode(String),

    /// Payload could not be deserialized. The worker rejects without requeue.
    #[error("payload decode failed: {0}")]
    Decode(String),

    /// Message handler reported a failure. Treated as permanent: rejected
    /// without requeue.
    #[error("handler failed: {0}")]
    Handler(String),
}
