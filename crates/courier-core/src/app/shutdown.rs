//! Cooperative shutdown over a watch channel.
//!
//! The controller side is held by whoever listens for the interrupt signal;
//! each loop holds a signal clone and stops taking new work once triggered.
//! Connections are closed by the loops themselves, so every exit path
//! (normal, signal, error) releases the connection exactly once.

use std::sync::Arc;

use tokio::sync::watch;

/// Requests shutdown. Cloneable so any task (signal listener, failing role)
/// can trigger the sequence.
#[derive(Debug, Clone)]
pub struct ShutdownController {
    tx: Arc<watch::Sender<bool>>,
}

/// Observes a shutdown request.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownController {
    pub fn new() -> (Self, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, ShutdownSignal { rx })
    }

    /// Request shutdown. Idempotent; ignores absent receivers.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Suspend until shutdown is requested. Returns immediately if it
    /// already was. A dropped controller counts as a shutdown request.
    pub async fn triggered(&mut self) {
        // wait_for resolves immediately when the current value matches
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_waiters() {
        let (controller, mut signal) = ShutdownController::new();
        assert!(!signal.is_triggered());

        let waiter = tokio::spawn(async move {
            signal.triggered().await;
            signal.is_triggered()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.trigger();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn triggered_returns_immediately_after_trigger() {
        let (controller, mut signal) = ShutdownController::new();
        controller.trigger();
        signal.triggered().await;
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn dropped_controller_counts_as_shutdown() {
        let (controller, mut signal) = ShutdownController::new();
        drop(controller);
        signal.triggered().await;
    }
}
