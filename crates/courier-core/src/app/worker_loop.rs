//! Consumer worker loop: prefetch-bounded, handler-driven ack/reject.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::connect::ConnectionManager;
use crate::app::shutdown::ShutdownSignal;
use crate::domain::{CourierError, Outcome, QueueSpec};
use crate::ports::{Connection, Connector};

/// Handles one delivery and decides its fate.
///
/// The handler sees raw bytes; decoding is its concern (the `typed` module
/// provides a JSON adapter that maps decode failures to `Reject`). Control
/// flow stays visible: the worker loop invokes the handler synchronously per
/// delivery, nothing is buried in callback registration.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Outcome;
}

/// The processor role: consume one queue with prefetch 1.
///
/// Prefetch 1 is a deliberate backpressure choice: the broker delivers at
/// most one unacknowledged message at a time, so a slow or failing handler
/// cannot accumulate an unbounded in-flight set, and processing stays
/// serialized in queue order.
pub struct Worker {
    connection: Box<dyn Connection>,
    queue: QueueSpec,
    handler: Arc<dyn Handler>,
    shutdown: ShutdownSignal,
}

impl Worker {
    pub fn new(
        connection: Box<dyn Connection>,
        queue: QueueSpec,
        handler: Arc<dyn Handler>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            connection,
            queue,
            handler,
            shutdown,
        }
    }

    /// Consume until shutdown or an unexpected error, then close the
    /// connection. In-flight deliveries that were already acknowledged are
    /// not rolled back.
    pub async fn run(mut self) -> Result<(), CourierError> {
        let result = self.consume_loop().await;
        if let Err(err) = &result {
            error!(error = %err, "worker loop error, shutting down");
        }

        match self.connection.close().await {
            Ok(()) => info!("broker connection closed"),
            Err(err) => warn!(error = %err, "failed to close broker connection"),
        }
        result
    }

    async fn consume_loop(&mut self) -> Result<(), CourierError> {
        self.connection.declare_queue(&self.queue).await?;
        self.connection.set_prefetch(1).await?;
        info!(queue = %self.queue.name, "waiting for messages");

        loop {
            let delivery = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => {
                    info!("received shutdown signal, stopping consumer");
                    return Ok(());
                }
                delivery = self.connection.next_delivery(&self.queue.name) => delivery?,
            };

            let tag = delivery.delivery_tag();
            match self.handler.handle(delivery.payload()).await {
                Outcome::Ack => {
                    delivery.ack().await?;
                    debug!(delivery_tag = tag, "delivery acknowledged");
                }
                Outcome::Reject => {
                    delivery.reject().await?;
                    warn!(delivery_tag = tag, "delivery rejected without requeue");
                }
            }
        }
    }
}

/// Spawns `n` workers, each with its own connection.
///
/// Workers share no mutable state except the broker itself, so scaling out
/// is just more connections; the prefetch bound applies per worker.
pub struct WorkerGroup {
    joins: Vec<JoinHandle<Result<(), CourierError>>>,
}

impl WorkerGroup {
    pub async fn spawn<C>(
        n: usize,
        connector: C,
        config: crate::domain::BrokerConfig,
        queue: QueueSpec,
        handler: Arc<dyn Handler>,
        shutdown: ShutdownSignal,
    ) -> Self
    where
        C: Connector + Clone + 'static,
    {
        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let manager = ConnectionManager::new(connector.clone(), config.clone());
            let queue = queue.clone();
            let handler = Arc::clone(&handler);
            let mut shutdown = shutdown.clone();

            joins.push(tokio::spawn(async move {
                let Some(connection) = manager.connect(&mut shutdown).await else {
                    info!(worker_id, "shutdown before connection was established");
                    return Ok(());
                };
                Worker::new(connection, queue, handler, shutdown).run().await
            }));
        }
        Self { joins }
    }

    /// Wait for all workers to finish. The first error wins.
    pub async fn join(self) -> Result<(), CourierError> {
        let mut result = Ok(());
        for join in self.joins {
            match join.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
                Err(err) => warn!(error = %err, "worker task panicked or was cancelled"),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::shutdown::ShutdownController;
    use crate::domain::BrokerConfig;
    use crate::impls::InMemoryBroker;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct AckAll;

    #[async_trait]
    impl Handler for AckAll {
        async fn handle(&self, _payload: &[u8]) -> Outcome {
            Outcome::Ack
        }
    }

    struct RejectAll;

    #[async_trait]
    impl Handler for RejectAll {
        async fn handle(&self, _payload: &[u8]) -> Outcome {
            Outcome::Reject
        }
    }

    /// Sleeps inside the handler so deliveries overlap if the broker ever
    /// hands out more than the prefetch bound allows.
    struct SlowAck {
        handled: AtomicUsize,
    }

    #[async_trait]
    impl Handler for SlowAck {
        async fn handle(&self, _payload: &[u8]) -> Outcome {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.handled.fetch_add(1, Ordering::SeqCst);
            Outcome::Ack
        }
    }

    async fn setup(queue: &str) -> (InMemoryBroker, Box<dyn Connection>) {
        let broker = InMemoryBroker::new();
        let connection = broker.connect(&BrokerConfig::default()).await.unwrap();
        connection
            .declare_queue(&QueueSpec::durable(queue))
            .await
            .unwrap();
        (broker, connection)
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledged_messages_leave_the_queue() {
        let (broker, producer) = setup("game_events").await;
        producer.publish("game_events", b"one", true).await.unwrap();
        producer.publish("game_events", b"two", true).await.unwrap();

        let consumer = broker.connect(&BrokerConfig::default()).await.unwrap();
        let (controller, signal) = ShutdownController::new();
        let worker = Worker::new(
            consumer,
            QueueSpec::durable("game_events"),
            Arc::new(AckAll),
            signal,
        );
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = broker.queue_stats("game_events").await.unwrap();
        assert_eq!(stats.ready, 0);
        assert_eq!(stats.unacked, 0);
        assert_eq!(stats.acked, 2);

        controller.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_messages_are_dropped_not_redelivered() {
        let (broker, producer) = setup("game_events").await;
        producer.publish("game_events", b"bad", true).await.unwrap();

        let consumer = broker.connect(&BrokerConfig::default()).await.unwrap();
        let (controller, signal) = ShutdownController::new();
        let worker = Worker::new(
            consumer,
            QueueSpec::durable("game_events"),
            Arc::new(RejectAll),
            signal,
        );
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = broker.queue_stats("game_events").await.unwrap();
        assert_eq!(stats.ready, 0);
        assert_eq!(stats.unacked, 0);
        assert_eq!(stats.rejected, 1);

        controller.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn prefetch_bound_holds_under_backlog() {
        let (broker, producer) = setup("game_events").await;
        for i in 0..5u8 {
            producer
                .publish("game_events", &[i], true)
                .await
                .unwrap();
        }

        let consumer = broker.connect(&BrokerConfig::default()).await.unwrap();
        let (controller, signal) = ShutdownController::new();
        let worker = Worker::new(
            consumer,
            QueueSpec::durable("game_events"),
            Arc::new(SlowAck {
                handled: AtomicUsize::new(0),
            }),
            signal,
        );
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let stats = broker.queue_stats("game_events").await.unwrap();
        assert_eq!(stats.acked, 5);
        // Never more than one unacknowledged delivery outstanding.
        assert_eq!(stats.unacked_high_water, 1);

        controller.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_consume_wait_closes_connection_once() {
        let (broker, _producer) = setup("game_events").await;

        let consumer = broker.connect(&BrokerConfig::default()).await.unwrap();
        let (controller, signal) = ShutdownController::new();
        let worker = Worker::new(
            consumer,
            QueueSpec::durable("game_events"),
            Arc::new(AckAll),
            signal,
        );
        let handle = tokio::spawn(worker.run());

        // The worker is suspended in next_delivery on an empty queue.
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.trigger();
        handle.await.unwrap().unwrap();

        // Only the worker's connection was closed, and only once.
        assert_eq!(broker.connections_closed().await, 1);

        // Messages published after shutdown stay in the queue.
        let producer = broker.connect(&BrokerConfig::default()).await.unwrap();
        producer
            .declare_queue(&QueueSpec::durable("game_events"))
            .await
            .unwrap();
        producer.publish("game_events", b"late", true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(broker.queue_depth("game_events").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_group_drains_queue_with_independent_connections() {
        let broker = InMemoryBroker::new();
        let producer = broker.connect(&BrokerConfig::default()).await.unwrap();
        producer
            .declare_queue(&QueueSpec::durable("game_events"))
            .await
            .unwrap();
        for i in 0..8u8 {
            producer
                .publish("game_events", &[i], true)
                .await
                .unwrap();
        }

        let (controller, signal) = ShutdownController::new();
        let group = WorkerGroup::spawn(
            2,
            broker.clone(),
            BrokerConfig::default(),
            QueueSpec::durable("game_events"),
            Arc::new(AckAll),
            signal,
        )
        .await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        let stats = broker.queue_stats("game_events").await.unwrap();
        assert_eq!(stats.acked, 8);
        assert_eq!(stats.ready, 0);

        controller.trigger();
        group.join().await.unwrap();
    }
}
