//! Connection manager: connect with exponential backoff, forever.
//!
//! Availability over latency: a long-running worker under supervision is
//! better off blocking on reconnect than crash-looping, so there is no
//! maximum attempt count. The only ways out of the retry loop are a live
//! connection or a shutdown signal.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::app::shutdown::ShutdownSignal;
use crate::domain::{BrokerConfig, ConnectionState, ReconnectPolicy};
use crate::ports::{Connection, Connector};

/// Exponential backoff: starts at `initial_delay`, doubles per call, capped
/// at `max_delay`. Never resets once raised; the connect call that owns it
/// only returns on success.
#[derive(Debug)]
pub struct Backoff {
    delay: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(policy: &ReconnectPolicy) -> Self {
        Self {
            delay: policy.initial_delay,
            max: policy.max_delay,
        }
    }

    /// The delay to sleep before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.delay;
        self.delay = (self.delay * 2).min(self.max);
        current
    }
}

/// Establishes a connection, retrying transient failures indefinitely.
///
/// Modeled as an explicit state machine; transitions are published on a
/// watch channel so callers (and tests) can observe
/// `Disconnected -> Connecting -> Connected` or `-> ShuttingDown`.
pub struct ConnectionManager<C> {
    connector: C,
    config: BrokerConfig,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, config: BrokerConfig) -> Self {
        Self::with_policy(connector, config, ReconnectPolicy::default())
    }

    pub fn with_policy(connector: C, config: BrokerConfig, policy: ReconnectPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            config,
            policy,
            state_tx,
        }
    }

    /// Subscribe to connection state transitions.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Connect, retrying until success. Never yields a failed connection.
    ///
    /// Returns `None` only when shutdown is requested while retrying; every
    /// connect failure is logged and retried after the backoff delay.
    pub async fn connect(&self, shutdown: &mut ShutdownSignal) -> Option<Box<dyn Connection>> {
        let mut backoff = Backoff::new(&self.policy);
        self.transition(ConnectionState::Connecting);

        loop {
            if shutdown.is_triggered() {
                self.transition(ConnectionState::ShuttingDown);
                return None;
            }

            info!(endpoint = %self.config.endpoint(), "attempting to connect to broker");
            match self.connector.connect(&self.config).await {
                Ok(connection) => {
                    info!(endpoint = %self.config.endpoint(), "successfully connected to broker");
                    self.transition(ConnectionState::Connected);
                    return Some(connection);
                }
                Err(err) => {
                    let delay = backoff.next_delay();
                    error!(error = %err, "failed to connect to broker");
                    info!(delay_secs = delay.as_secs(), "retrying connection");

                    tokio::select! {
                        biased;
                        _ = shutdown.triggered() => {
                            self.transition(ConnectionState::ShuttingDown);
                            return None;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn transition(&self, state: ConnectionState) {
        // ignore send error: nobody has to be watching
        let _ = self.state_tx.send(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::shutdown::ShutdownController;
    use crate::impls::InMemoryBroker;
    use rstest::rstest;

    fn policy(initial: u64, max: u64) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_secs(initial),
            max_delay: Duration::from_secs(max),
        }
    }

    #[rstest]
    #[case(1, 60, &[1, 2, 4, 8, 16, 32, 60, 60, 60])]
    #[case(1, 10, &[1, 2, 4, 8, 10, 10])]
    #[case(5, 60, &[5, 10, 20, 40, 60, 60])]
    fn backoff_doubles_and_caps(#[case] initial: u64, #[case] max: u64, #[case] expected: &[u64]) {
        let mut backoff = Backoff::new(&policy(initial, max));
        for &secs in expected {
            assert_eq!(backoff.next_delay(), Duration::from_secs(secs));
        }
    }

    #[test]
    fn backoff_never_exceeds_max() {
        let mut backoff = Backoff::new(&policy(1, 60));
        for _ in 0..100 {
            assert!(backoff.next_delay() <= Duration::from_secs(60));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connect_retries_until_broker_is_reachable() {
        let broker = InMemoryBroker::new();
        broker.fail_connects(3).await;

        let manager = ConnectionManager::new(broker, BrokerConfig::default());
        let mut state = manager.state();
        let (_controller, mut signal) = ShutdownController::new();

        let connection = manager.connect(&mut signal).await;
        assert!(connection.is_some());
        assert_eq!(*state.borrow_and_update(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_transitions_through_connecting() {
        let broker = InMemoryBroker::new();
        let manager = ConnectionManager::new(broker, BrokerConfig::default());
        let mut state = manager.state();
        assert_eq!(*state.borrow_and_update(), ConnectionState::Disconnected);

        let (_controller, mut signal) = ShutdownController::new();
        let connection = manager.connect(&mut signal).await;
        assert!(connection.is_some());

        // The watch channel only keeps the latest value; after a successful
        // connect that value is Connected.
        state.changed().await.unwrap();
        assert_eq!(*state.borrow_and_update(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_backoff_yields_no_connection() {
        let broker = InMemoryBroker::new();
        broker.set_reachable(false).await;

        let manager = ConnectionManager::new(broker, BrokerConfig::default());
        let mut state = manager.state();
        let (controller, mut signal) = ShutdownController::new();

        let connect = tokio::spawn(async move { manager.connect(&mut signal).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.trigger();

        let connection = connect.await.unwrap();
        assert!(connection.is_none());
        let last = *state.borrow_and_update();
        assert_eq!(last, ConnectionState::ShuttingDown);
        assert!(last.is_terminal());
    }
}
