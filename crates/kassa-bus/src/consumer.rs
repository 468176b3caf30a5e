use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tracing::{debug, warn};

use kassa_core::error::KassaError;
use kassa_core::event::{DomainEvent, EventHeaders};

use crate::config::ConsumerConfig;
use crate::log::TopicLog;
use crate::BusError;

/// Committed-offset persistence for a consumer group. The services back this
/// with their sled meta tree so a restart resumes where the group left off.
pub trait OffsetStore: Send + Sync {
    fn load(&self, topic: &str, group: &str, partition: u32) -> Result<u64, BusError>;
    fn commit(&self, topic: &str, group: &str, partition: u32, offset: u64)
        -> Result<(), BusError>;
}

impl<T: OffsetStore + ?Sized> OffsetStore for std::sync::Arc<T> {
    fn load(&self, topic: &str, group: &str, partition: u32) -> Result<u64, BusError> {
        (**self).load(topic, group, partition)
    }

    fn commit(
        &self,
        topic: &str,
        group: &str,
        partition: u32,
        offset: u64,
    ) -> Result<(), BusError> {
        (**self).commit(topic, group, partition, offset)
    }
}

/// In-memory offsets for tests.
#[derive(Default)]
pub struct MemoryOffsetStore {
    offsets: Mutex<HashMap<(String, String, u32), u64>>,
}

impl OffsetStore for MemoryOffsetStore {
    fn load(&self, topic: &str, group: &str, partition: u32) -> Result<u64, BusError> {
        Ok(self
            .offsets
            .lock()
            .expect("offset map poisoned")
            .get(&(topic.to_string(), group.to_string(), partition))
            .copied()
            .unwrap_or(0))
    }

    fn commit(
        &self,
        topic: &str,
        group: &str,
        partition: u32,
        offset: u64,
    ) -> Result<(), BusError> {
        self.offsets
            .lock()
            .expect("offset map poisoned")
            .insert((topic.to_string(), group.to_string(), partition), offset);
        Ok(())
    }
}

/// A successfully decoded record handed to the handler.
#[derive(Debug, Clone)]
pub struct ConsumedEvent {
    pub headers: EventHeaders,
    pub key: String,
    pub event: DomainEvent,
}

/// Polling consumer for one topic under a named group.
///
/// Partitions are processed sequentially; the offset is committed only after
/// the handler returns Ok, so a crashed or failing handler sees the record
/// again — at-least-once. Records that do not decode as a known event type
/// are logged and skipped (their offset is committed).
pub struct EventConsumer<S: OffsetStore> {
    log: TopicLog,
    offsets: S,
    config: ConsumerConfig,
}

impl<S: OffsetStore> EventConsumer<S> {
    pub fn new(log: TopicLog, offsets: S, config: ConsumerConfig) -> Self {
        Self {
            log,
            offsets,
            config,
        }
    }

    /// Poll every partition once. Returns the number of records handled
    /// (committed), counting skipped unknown types.
    pub async fn poll_once<F, Fut>(&self, handler: &F) -> Result<usize, BusError>
    where
        F: Fn(ConsumedEvent) -> Fut,
        Fut: Future<Output = Result<(), KassaError>>,
    {
        let topic = self.log.topic().to_string();
        let group = &self.config.group;
        let mut handled = 0;

        for partition in 0..self.log.partitions() {
            let start = self.offsets.load(&topic, group, partition)?;
            let batch = self.log.read_from(partition, start, self.config.batch_size)?;

            for (next_offset, record) in batch {
                match record.decode() {
                    Ok(event) => {
                        let consumed = ConsumedEvent {
                            headers: record.headers,
                            key: record.key,
                            event,
                        };
                        let event_type = consumed.headers.event_type.clone();
                        match handler(consumed).await {
                            Ok(()) => {
                                self.offsets.commit(&topic, group, partition, next_offset)?;
                                handled += 1;
                                debug!(%topic, partition, %event_type, "event handled");
                            }
                            Err(e) => {
                                // Leave the offset where it is: the record is
                                // redelivered on the next poll.
                                warn!(
                                    %topic,
                                    partition,
                                    %event_type,
                                    error = %e,
                                    "event handler failed — will redeliver"
                                );
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            %topic,
                            partition,
                            event_type = %record.headers.event_type,
                            error = %e,
                            "unknown or malformed event — skipping"
                        );
                        self.offsets.commit(&topic, group, partition, next_offset)?;
                        handled += 1;
                    }
                }
            }
        }
        Ok(handled)
    }

    /// Run the poll loop until the task is aborted.
    pub async fn run<F, Fut>(self, handler: F)
    where
        F: Fn(ConsumedEvent) -> Fut,
        Fut: Future<Output = Result<(), KassaError>>,
    {
        loop {
            if let Err(e) = self.poll_once(&handler).await {
                warn!(topic = %self.log.topic(), error = %e, "consumer poll failed");
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
