//! Handler outcome: what the worker loop does with a delivery.

/// Result of handling one delivery.
///
/// Rejection never requeues in this policy: a rejected message is dropped by
/// the broker (or dead-lettered, where the broker supports it) rather than
/// retried forever. This avoids poison-message loops at the cost of treating
/// all handler failures as permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Processing succeeded; remove the message from the queue permanently.
    Ack,
    /// Processing failed or the payload was malformed; reject without requeue.
    Reject,
}

impl Outcome {
    pub fn is_ack(self) -> bool {
        matches!(self, Outcome::Ack)
    }
}
