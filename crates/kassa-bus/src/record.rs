use serde::{Deserialize, Serialize};

use kassa_core::event::{DomainEvent, EventHeaders};

/// One durable record: headers, partition key and the JSON event body.
///
/// The body is kept as a raw `serde_json::Value` so consumers can inspect
/// the headers of event types they do not understand and skip them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub headers: EventHeaders,
    pub key: String,
    pub payload: serde_json::Value,
}

impl EventRecord {
    /// Decode the body into the typed event envelope.
    pub fn decode(&self) -> Result<DomainEvent, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
