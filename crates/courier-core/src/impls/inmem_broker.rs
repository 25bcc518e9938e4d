//! In-memory broker: the development and test implementation of the
//! broker port.
//!
//! It models the semantics the framework depends on (durable queues,
//! persistent messages, FIFO delivery, per-connection prefetch, ack/reject)
//! plus the failure levers tests need: reachability control for connect
//! retry and a `restart()` that simulates a broker restart.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::domain::{BrokerConfig, CourierError, DeliveryTag, MessageId, QueueSpec};
use crate::ports::{Connection, Connector, Delivery};

/// One stored message.
#[derive(Debug, Clone)]
struct StoredMessage {
    id: MessageId,
    payload: Vec<u8>,
    persistent: bool,
    enqueued_at: DateTime<Utc>,
}

/// Per-queue state. Ready messages are FIFO; unacked messages are keyed by
/// delivery tag (tags increase monotonically, so iteration order is
/// delivery order).
#[derive(Debug, Default)]
struct QueueState {
    durable: bool,
    ready: VecDeque<StoredMessage>,
    unacked: BTreeMap<DeliveryTag, StoredMessage>,
    acked: u64,
    rejected: u64,
    unacked_high_water: usize,
}

impl QueueState {
    fn new(durable: bool) -> Self {
        Self {
            durable,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    reachable: bool,
    connect_failures_left: u32,
    next_delivery_tag: DeliveryTag,
    connections_closed: u64,
}

impl BrokerState {
    fn new() -> Self {
        Self {
            queues: HashMap::new(),
            reachable: true,
            connect_failures_left: 0,
            next_delivery_tag: 1,
            connections_closed: 0,
        }
    }
}

/// Counts for one queue, for tests and status views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub ready: usize,
    pub unacked: usize,
    pub acked: u64,
    pub rejected: u64,
    /// Most unacknowledged deliveries ever outstanding at once; with
    /// prefetch 1 this must never exceed 1.
    pub unacked_high_water: usize,
}

/// The broker itself. Cloning shares the underlying state, so a clone can
/// be handed to each role as its `Connector`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::new())),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Make connect attempts fail (or succeed again).
    pub async fn set_reachable(&self, reachable: bool) {
        self.state.lock().await.reachable = reachable;
    }

    /// Fail the next `n` connect attempts, then recover.
    pub async fn fail_connects(&self, n: u32) {
        self.state.lock().await.connect_failures_left = n;
    }

    /// Simulate a broker restart: non-durable queues disappear, unacked
    /// messages are requeued at the front (they were never acknowledged, so
    /// they will be redelivered), and only persistent messages survive.
    ///
    /// Existing connections are left alone; a real broker would sever them,
    /// but the callers that exercise restart reconnect anyway.
    pub async fn restart(&self) {
        let mut state = self.state.lock().await;
        state.queues.retain(|_, queue| queue.durable);
        for queue in state.queues.values_mut() {
            // Highest tag first, so the oldest delivery ends up at the head.
            while let Some((_, message)) = queue.unacked.pop_last() {
                queue.ready.push_front(message);
            }
            queue.ready.retain(|message| message.persistent);
        }
        drop(state);
        self.notify.notify_waiters();
    }

    /// Ready (undelivered) messages in a queue. Zero for unknown queues.
    pub async fn queue_depth(&self, queue: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(queue).map_or(0, |q| q.ready.len())
    }

    pub async fn queue_stats(&self, queue: &str) -> Option<QueueStats> {
        let state = self.state.lock().await;
        state.queues.get(queue).map(|q| QueueStats {
            ready: q.ready.len(),
            unacked: q.unacked.len(),
            acked: q.acked,
            rejected: q.rejected,
            unacked_high_water: q.unacked_high_water,
        })
    }

    /// How many connections have been closed, in total.
    pub async fn connections_closed(&self) -> u64 {
        self.state.lock().await.connections_closed
    }
}

#[async_trait]
impl Connector for InMemoryBroker {
    async fn connect(&self, config: &BrokerConfig) -> Result<Box<dyn Connection>, CourierError> {
        let mut state = self.state.lock().await;
        if state.connect_failures_left > 0 {
            state.connect_failures_left -= 1;
            return Err(CourierError::Unreachable(format!(
                "connection to {} refused",
                config.endpoint()
            )));
        }
        if !state.reachable {
            return Err(CourierError::Unreachable(format!(
                "no route to {}",
                config.endpoint()
            )));
        }

        Ok(Box::new(InMemoryConnection {
            state: Arc::clone(&self.state),
            notify: Arc::clone(&self.notify),
            prefetch: AtomicUsize::new(0),
            outstanding: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

/// One session against the in-memory broker. The prefetch bound and the
/// outstanding-delivery count are per connection, matching QoS semantics.
struct InMemoryConnection {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
    prefetch: AtomicUsize,
    outstanding: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl InMemoryConnection {
    fn ensure_open(&self) -> Result<(), CourierError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CourierError::ConnectionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for InMemoryConnection {
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), CourierError> {
        self.ensure_open()?;
        let mut state = self.state.lock().await;
        match state.queues.get(&spec.name) {
            Some(existing) if existing.durable == spec.durable => Ok(()),
            Some(_) => Err(CourierError::QueueMismatch {
                name: spec.name.clone(),
            }),
            None => {
                state
                    .queues
                    .insert(spec.name.clone(), QueueState::new(spec.durable));
                debug!(queue = %spec.name, durable = spec.durable, "queue declared");
                Ok(())
            }
        }
    }

    async fn publish(
        &self,
        queue: &str,
        payload: &[u8],
        persistent: bool,
    ) -> Result<(), CourierError> {
        self.ensure_open()?;
        let message = StoredMessage {
            id: MessageId::generate(),
            payload: payload.to_vec(),
            persistent,
            enqueued_at: Utc::now(),
        };

        {
            let mut state = self.state.lock().await;
            let queue_state =
                state
                    .queues
                    .get_mut(queue)
                    .ok_or_else(|| CourierError::PublishFailed {
                        queue: queue.to_string(),
                        reason: "queue is not declared".to_string(),
                    })?;
            debug!(queue, message_id = %message.id, enqueued_at = %message.enqueued_at, "message stored");
            queue_state.ready.push_back(message);
        }

        self.notify.notify_waiters();
        Ok(())
    }

    async fn set_prefetch(&self, prefetch: usize) -> Result<(), CourierError> {
        self.ensure_open()?;
        self.prefetch.store(prefetch, Ordering::SeqCst);
        Ok(())
    }

    async fn next_delivery(&self, queue: &str) -> Result<Box<dyn Delivery>, CourierError> {
        loop {
            // Register interest before checking state, so a publish between
            // the check and the await still wakes us.
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                self.ensure_open()?;

                let prefetch = self.prefetch.load(Ordering::SeqCst);
                let under_bound =
                    prefetch == 0 || self.outstanding.load(Ordering::SeqCst) < prefetch;
                if under_bound {
                    let tag = state.next_delivery_tag;
                    let queue_state = state
                        .queues
                        .get_mut(queue)
                        .ok_or_else(|| CourierError::QueueNotFound(queue.to_string()))?;
                    if let Some(message) = queue_state.ready.pop_front() {
                        queue_state.unacked.insert(tag, message.clone());
                        queue_state.unacked_high_water = queue_state
                            .unacked_high_water
                            .max(queue_state.unacked.len());
                        state.next_delivery_tag = tag + 1;
                        self.outstanding.fetch_add(1, Ordering::SeqCst);
                        debug!(queue, delivery_tag = tag, message_id = %message.id, "message delivered");

                        return Ok(Box::new(InMemoryDelivery {
                            tag,
                            message,
                            queue: queue.to_string(),
                            state: Arc::clone(&self.state),
                            notify: Arc::clone(&self.notify),
                            outstanding: Arc::clone(&self.outstanding),
                        }));
                    }
                }
            }

            notified.await;
        }
    }

    async fn close(&self) -> Result<(), CourierError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(CourierError::ConnectionClosed);
        }
        self.state.lock().await.connections_closed += 1;
        self.notify.notify_waiters();
        Ok(())
    }
}

/// A delivered message. Consuming `self` on ack/reject is what makes
/// double-ack unrepresentable.
struct InMemoryDelivery {
    tag: DeliveryTag,
    message: StoredMessage,
    queue: String,
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
    outstanding: Arc<AtomicUsize>,
}

impl InMemoryDelivery {
    /// Settle the delivery. After a restart the tag may be gone (the message
    /// was requeued for redelivery); settling then is a no-op.
    async fn settle(self: Box<Self>, acked: bool) -> Result<(), CourierError> {
        {
            let mut state = self.state.lock().await;
            if let Some(queue_state) = state.queues.get_mut(&self.queue)
                && queue_state.unacked.remove(&self.tag).is_some()
            {
                if acked {
                    queue_state.acked += 1;
                } else {
                    queue_state.rejected += 1;
                }
            }
        }
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl Delivery for InMemoryDelivery {
    fn delivery_tag(&self) -> DeliveryTag {
        self.tag
    }

    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    async fn ack(self: Box<Self>) -> Result<(), CourierError> {
        self.settle(true).await
    }

    async fn reject(self: Box<Self>) -> Result<(), CourierError> {
        self.settle(false).await
    }
}
