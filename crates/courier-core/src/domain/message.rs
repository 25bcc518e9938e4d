//! Message identifiers.
//!
//! The core treats payloads as opaque bytes; these types only identify
//! messages and deliveries, they say nothing about content.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Broker-assigned identifier for a stored message.
///
/// ULID keeps ids sortable by enqueue time without any coordination.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(Ulid);

impl MessageId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Broker-assigned ordering token identifying one delivery.
///
/// The tag belongs to the delivery, not the message: a redelivered message
/// gets a fresh tag.
pub type DeliveryTag = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_sortable_by_generation_order() {
        let a = MessageId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = MessageId::generate();
        assert!(a < b);
        // The ordering comes from the embedded timestamp.
        assert!(a.as_ulid().timestamp_ms() < b.as_ulid().timestamp_ms());
    }

    #[test]
    fn message_id_display_has_prefix() {
        let id = MessageId::generate();
        assert!(id.to_string().starts_with("msg-"));
    }
}
