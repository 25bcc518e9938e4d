//! Broker port: connector, connection, and delivery traits.

use async_trait::async_trait;

use crate::domain::{BrokerConfig, CourierError, DeliveryTag, QueueSpec};

/// Establishes broker sessions.
///
/// A single connect attempt: it either yields a live connection or fails.
/// Retry discipline lives in the connection manager, not here.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &BrokerConfig) -> Result<Box<dyn Connection>, CourierError>;
}

/// One logical session to the broker.
///
/// Exclusively owned by the publisher or worker that created it; no two
/// tasks share a connection. Closed deterministically on shutdown on every
/// exit path.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Declare a queue (declare-if-absent). Safe to call every time; fails
    /// only if the queue exists with different properties.
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), CourierError>;

    /// Publish a payload to a queue. With `persistent`, the broker writes
    /// the message to stable storage so it survives a broker restart.
    async fn publish(
        &self,
        queue: &str,
        payload: &[u8],
        persistent: bool,
    ) -> Result<(), CourierError>;

    /// Bound the number of unacknowledged deliveries this connection may
    /// hold at once (QoS). Zero means unlimited.
    async fn set_prefetch(&self, prefetch: usize) -> Result<(), CourierError>;

    /// Wait for the next delivery on `queue`, honoring the prefetch bound.
    /// Suspends until a message is available or the connection is closed.
    async fn next_delivery(&self, queue: &str) -> Result<Box<dyn Delivery>, CourierError>;

    /// Close the session. Closing an already-closed connection is an error;
    /// the lifecycle loops guarantee exactly one close per connection.
    async fn close(&self) -> Result<(), CourierError>;
}

/// Receipt of one message, to be acknowledged or rejected exactly once.
///
/// `ack` and `reject` take `self: Box<Self>`: the handle is consumed on
/// first use, so double-ack and double-reject do not compile.
#[async_trait]
pub trait Delivery: Send {
    fn delivery_tag(&self) -> DeliveryTag;

    fn payload(&self) -> &[u8];

    /// Acknowledge: remove the message from the queue permanently.
    async fn ack(self: Box<Self>) -> Result<(), CourierError>;

    /// Reject without requeue: the message is dropped (or dead-lettered by
    /// brokers that support it), never redelivered to this queue.
    async fn reject(self: Box<Self>) -> Result<(), CourierError>;
}
