//! Configuration types for the broker connection and reconnect policy.

use std::time::Duration;

/// Parameters for one logical broker session.
///
/// The heartbeat interval and blocked-connection timeout are carried here so
/// a real broker adapter can honor them; the in-memory implementation only
/// records them.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub heartbeat: Duration,
    pub blocked_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            heartbeat: Duration::from_secs(600),
            blocked_timeout: Duration::from_secs(300),
        }
    }
}

impl BrokerConfig {
    /// "host:port" for log messages.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A named queue and its declared properties.
///
/// Declaration is declare-if-absent: declaring an existing queue with the
/// same properties succeeds, declaring it with different properties is an
/// error. Both roles declare the queue so either can start first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    /// Durable queues survive a broker restart (messages survive too, when
    /// they were published as persistent).
    pub durable: bool,
}

impl QueueSpec {
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
        }
    }

    pub fn transient(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
        }
    }
}

/// Reconnect backoff policy: delay starts at `initial_delay`, doubles per
/// failed attempt, and is capped at `max_delay`. It never resets within a
/// single connect call (the call only returns on success or shutdown).
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_config_defaults_match_reference_service() {
        let config = BrokerConfig::default();
        assert_eq!(config.endpoint(), "localhost:5672");
        assert_eq!(config.username, "guest");
        assert_eq!(config.heartbeat, Duration::from_secs(600));
        assert_eq!(config.blocked_timeout, Duration::from_secs(300));
    }

    #[test]
    fn queue_spec_constructors_set_durability() {
        assert!(QueueSpec::durable("game_events").durable);
        assert!(!QueueSpec::transient("scratch").durable);
    }
}
