//! Connection lifecycle state machine.

/// State of the connection manager.
///
/// Transitions:
/// - Disconnected -> Connecting (connect requested)
/// - Connecting -> Connected (attempt succeeded)
/// - Connecting -> Connecting (attempt failed; retry after backoff)
/// - Connecting -> ShuttingDown (shutdown signal during retry)
///
/// There is no failure-terminal state: every connect failure is transient by
/// policy, so the only exits from `Connecting` are success or shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ShuttingDown,
}

impl ConnectionState {
    /// Is this a terminal state (the connect call has returned)?
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::ShuttingDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connected_and_shutting_down_are_terminal() {
        assert!(!ConnectionState::Disconnected.is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(ConnectionState::Connected.is_terminal());
        assert!(ConnectionState::ShuttingDown.is_terminal());
    }
}
