//! Publisher: durable queue declaration plus persistent publish, and the
//! interval-driven publish loop for the ingestor role.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::app::shutdown::ShutdownSignal;
use crate::domain::{CourierError, QueueSpec};
use crate::ports::Connection;

/// Produces the payloads an ingestor publishes.
///
/// Serialization is the caller's concern; the publisher only ever sees
/// bytes.
pub trait MessageSource: Send {
    fn next_payload(&mut self) -> Result<Vec<u8>, CourierError>;
}

/// Publishes persistent messages to one durable queue.
///
/// The queue is declared on every publish (declare-if-absent, safe to
/// repeat), so either role can start first. Publish errors propagate to the
/// caller: connection failures are retried transparently by the connection
/// manager, but a failed publish may indicate a logic error and blind retry
/// could duplicate.
pub struct Publisher {
    queue: QueueSpec,
}

impl Publisher {
    pub fn new(queue: QueueSpec) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &QueueSpec {
        &self.queue
    }

    /// Declare the queue and publish one persistent message.
    ///
    /// Each successful call is an at-least-once delivery into the queue; the
    /// core keeps no deduplication state, so consumers must tolerate
    /// duplicates.
    pub async fn publish(
        &self,
        connection: &dyn Connection,
        payload: &[u8],
    ) -> Result<(), CourierError> {
        connection.declare_queue(&self.queue).await?;
        connection.publish(&self.queue.name, payload, true).await?;
        debug!(queue = %self.queue.name, bytes = payload.len(), "message published");
        Ok(())
    }
}

/// The ingestor role: publish a payload from the source every `interval`
/// until shutdown. Owns its connection and releases it on every exit path.
pub struct PublishLoop {
    connection: Box<dyn Connection>,
    publisher: Publisher,
    interval: Duration,
    source: Box<dyn MessageSource>,
    shutdown: ShutdownSignal,
}

impl PublishLoop {
    pub fn new(
        connection: Box<dyn Connection>,
        queue: QueueSpec,
        interval: Duration,
        source: Box<dyn MessageSource>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            connection,
            publisher: Publisher::new(queue),
            interval,
            source,
            shutdown,
        }
    }

    /// Run until shutdown or a publish error, then close the connection.
    pub async fn run(mut self) -> Result<(), CourierError> {
        info!(
            queue = %self.publisher.queue().name,
            interval_secs = self.interval.as_secs(),
            "starting message publishing loop"
        );

        let result = self.publish_until_shutdown().await;
        if let Err(err) = &result {
            error!(error = %err, "publish loop error, shutting down");
        }

        match self.connection.close().await {
            Ok(()) => info!("broker connection closed"),
            Err(err) => warn!(error = %err, "failed to close broker connection"),
        }
        result
    }

    async fn publish_until_shutdown(&mut self) -> Result<(), CourierError> {
        loop {
            if self.shutdown.is_triggered() {
                info!("received shutdown signal, stopping publisher");
                return Ok(());
            }

            let payload = self.source.next_payload()?;
            self.publisher
                .publish(self.connection.as_ref(), &payload)
                .await?;

            tokio::select! {
                biased;
                _ = self.shutdown.triggered() => {
                    info!("received shutdown signal, stopping publisher");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
