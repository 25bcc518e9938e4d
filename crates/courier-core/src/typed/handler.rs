//! Typed handler adapter.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::app::Handler;
use crate::domain::{CourierError, Outcome};
use crate::typed::JsonCodec;

/// Handles a decoded message of type `T`.
#[async_trait]
pub trait MessageHandler<T>: Send + Sync
where
    T: DeserializeOwned + Send,
{
    async fn handle(&self, message: T) -> Result<(), CourierError>;
}

/// Adapts a `MessageHandler<T>` to the raw byte-payload [`Handler`].
///
/// Failure policy:
/// - decode failure -> `Reject` (malformed payloads are never retried)
/// - handler error -> `Reject` (all processing failures treated as permanent)
/// - handler success -> `Ack`
pub struct TypedHandler<T, H> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T, H> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T, H> Handler for TypedHandler<T, H>
where
    T: DeserializeOwned + Send + Sync + 'static,
    H: MessageHandler<T>,
{
    async fn handle(&self, payload: &[u8]) -> Outcome {
        let message: T = match JsonCodec::decode(payload) {
            Ok(message) => message,
            Err(err) => {
                error!(error = %err, "failed to parse message payload");
                return Outcome::Reject;
            }
        };

        match self.handler.handle(message).await {
            Ok(()) => Outcome::Ack,
            Err(err) => {
                error!(error = %err, "error processing message");
                Outcome::Reject
            }
        }
    }
}
