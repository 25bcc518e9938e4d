//! Domain model (configuration, identifiers, states, outcomes, errors).

pub mod config;
pub mod errors;
pub mod message;
pub mod outcome;
pub mod state;

pub use config::{BrokerConfig, QueueSpec, ReconnectPolicy};
pub use errors::CourierError;
pub use message::{DeliveryTag, MessageId};
pub use outcome::Outcome;
pub use state::ConnectionState;
