use std::path::PathBuf;
use std::time::Duration;

use kassa_core::constants::PUBLISH_QUEUE_CAPACITY;

/// Where topic logs live and how many partitions a new topic gets.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Root directory holding one subdirectory per topic.
    pub root: PathBuf,
    /// Partition count applied when a topic is first created.
    pub partitions: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./bus"),
            partitions: 6,
        }
    }
}

/// Tuning for the fire-and-forget publisher worker.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Producing service name, stamped into the `source` header.
    pub source: String,
    /// Bounded queue capacity. Overflow drops the oldest queued event and
    /// bumps the dropped counter.
    pub queue_capacity: usize,
    /// Append attempts per record before the record is abandoned.
    pub max_attempts: u32,
    /// Wait between append attempts.
    pub retry_backoff: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            source: "kassa".into(),
            queue_capacity: PUBLISH_QUEUE_CAPACITY,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// Tuning for a polling group consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Consumer group name; offsets are committed per (topic, group, partition).
    pub group: String,
    /// Idle wait between polls of an exhausted topic.
    pub poll_interval: Duration,
    /// Maximum records taken from one partition per poll.
    pub batch_size: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: "kassa".into(),
            poll_interval: Duration::from_millis(250),
            batch_size: 64,
        }
    }
}
