//! kassa-bus
//!
//! Durable log-based event fabric for the Kassa services.
//!
//! A topic is a directory of fixed-count partition files holding
//! length-prefixed JSON records. Producers append through a fire-and-forget
//! worker with a bounded queue; consumers poll partitions sequentially under
//! a named group, committing byte offsets only after the handler succeeds —
//! at-least-once delivery, so every handler must be idempotent.

pub mod config;
pub mod consumer;
pub mod log;
pub mod publisher;
pub mod record;

pub use config::{BusConfig, ConsumerConfig, PublisherConfig};
pub use consumer::{ConsumedEvent, EventConsumer, MemoryOffsetStore, OffsetStore};
pub use log::TopicLog;
pub use publisher::EventPublisher;
pub use record::EventRecord;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bus serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("partition {partition} out of range (topic has {partitions})")]
    PartitionOutOfRange { partition: u32, partitions: u32 },

    #[error("offset store error: {0}")]
    OffsetStore(String),
}
