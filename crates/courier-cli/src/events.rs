//! Reference event domain: the placeholder game events the ingestor
//! publishes and the processor consumes.
//!
//! The core is payload-agnostic; everything in this module is caller-side
//! (envelope shape, serialization, processing stub).

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use courier_core::app::MessageSource;
use courier_core::domain::CourierError;
use courier_core::typed::{JsonCodec, MessageHandler};

/// Wire envelope for one placeholder game event (UTF-8 JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    pub game_id: String,
    /// ISO-8601 UTC.
    pub timestamp: String,
    pub home_team: String,
    pub away_team: String,
    pub status: String,
    pub message_number: u64,
}

impl GameEvent {
    pub fn placeholder(message_number: u64) -> Self {
        Self {
            game_id: format!("test_{message_number:03}"),
            timestamp: now_utc(),
            home_team: "Test Home Team".to_string(),
            away_team: "Test Away Team".to_string(),
            status: "placeholder_data".to_string(),
            message_number,
        }
    }
}

fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Generates numbered placeholder events, one per publish interval.
pub struct GameEventSource {
    counter: u64,
}

impl GameEventSource {
    pub fn new() -> Self {
        Self { counter: 0 }
    }
}

impl Default for GameEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSource for GameEventSource {
    fn next_payload(&mut self) -> Result<Vec<u8>, CourierError> {
        self.counter += 1;
        let event = GameEvent::placeholder(self.counter);
        info!(
            game_id = %event.game_id,
            message_number = event.message_number,
            "publishing placeholder event"
        );
        JsonCodec::encode(&event)
    }
}

/// Result record the processor logs for each placeholder event.
#[derive(Debug, Serialize)]
struct ProcessedResult {
    processed_at: String,
    original_game_id: String,
    processing_status: &'static str,
    notes: &'static str,
}

/// Stubbed transformation: logs receipt and a processed-result record.
/// Real analytics would replace this handler; the substrate around it
/// (ack/reject, prefetch, shutdown) stays the same.
pub struct GameEventProcessor;

#[async_trait]
impl MessageHandler<GameEvent> for GameEventProcessor {
    async fn handle(&self, event: GameEvent) -> Result<(), CourierError> {
        info!(
            game_id = %event.game_id,
            message_number = event.message_number,
            status = %event.status,
            "message received"
        );

        if event.status == "placeholder_data" {
            let result = ProcessedResult {
                processed_at: now_utc(),
                original_game_id: event.game_id,
                processing_status: "success",
                notes: "Placeholder processing completed",
            };
            info!(
                processed_at = %result.processed_at,
                original_game_id = %result.original_game_id,
                processing_status = result.processing_status,
                notes = result.notes,
                "processing completed"
            );
        }
        Ok(())
    }
}
