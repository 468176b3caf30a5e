use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{debug, warn};

use kassa_core::constants::EVENT_SCHEMA_VERSION;
use kassa_core::event::{DomainEvent, EventHeaders};

use crate::config::PublisherConfig;
use crate::log::TopicLog;
use crate::record::EventRecord;

/// Fire-and-forget event publisher.
///
/// `publish` enqueues and returns immediately; a dedicated worker appends to
/// the topic logs with bounded retries. Appends that still fail are logged
/// and abandoned — a publish failure never reaches the command that
/// triggered it. Queue overflow drops the oldest queued record and bumps the
/// dropped counter.
#[derive(Clone)]
pub struct EventPublisher {
    inner: Arc<Inner>,
}

struct Inner {
    config: PublisherConfig,
    topics: HashMap<String, TopicLog>,
    queue: Mutex<VecDeque<(String, EventRecord)>>,
    notify: Notify,
    in_flight: AtomicUsize,
    dropped: AtomicU64,
}

impl EventPublisher {
    /// Build a publisher over the given topic logs without starting the
    /// worker. Call [`EventPublisher::spawn_worker`] once a runtime is up.
    pub fn new(config: PublisherConfig, topics: Vec<TopicLog>) -> Self {
        let topics = topics
            .into_iter()
            .map(|log| (log.topic().to_string(), log))
            .collect();
        Self {
            inner: Arc::new(Inner {
                config,
                topics,
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                in_flight: AtomicUsize::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Convenience: build and immediately start the worker task.
    pub fn spawn(config: PublisherConfig, topics: Vec<TopicLog>) -> Self {
        let publisher = Self::new(config, topics);
        publisher.spawn_worker();
        publisher
    }

    pub fn spawn_worker(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                // Mark the popped record in-flight under the queue lock so
                // `drain` never observes an empty queue mid-append.
                let item = {
                    let mut queue = inner.queue.lock().expect("publish queue poisoned");
                    let item = queue.pop_front();
                    if item.is_some() {
                        inner.in_flight.store(1, Ordering::SeqCst);
                    }
                    item
                };
                match item {
                    Some((topic, record)) => {
                        Inner::append_with_retry(&inner, &topic, &record).await;
                        inner.in_flight.store(0, Ordering::SeqCst);
                    }
                    None => inner.notify.notified().await,
                }
            }
        });
    }

    /// Enqueue `event` for `topic`. Never blocks, never fails.
    pub fn publish(&self, topic: &str, event: DomainEvent) {
        if !self.inner.topics.contains_key(topic) {
            warn!(topic, "publish to unregistered topic — event discarded");
            return;
        }

        let headers = EventHeaders {
            event_id: event.event_id,
            event_type: event.payload.event_type().to_string(),
            event_timestamp: event.timestamp.timestamp_millis(),
            source: self.inner.config.source.clone(),
            correlation_id: event.correlation_id,
            content_type: "application/json".to_string(),
            schema_version: EVENT_SCHEMA_VERSION,
            entity_id: event.payload.entity_id(),
        };
        let key = event.payload.partition_key();
        let payload = match serde_json::to_value(&event) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to encode event — discarded");
                return;
            }
        };
        let record = EventRecord {
            headers,
            key,
            payload,
        };

        {
            let mut queue = self.inner.queue.lock().expect("publish queue poisoned");
            if queue.len() >= self.inner.config.queue_capacity {
                queue.pop_front();
                let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(topic, dropped, "publish queue full — dropped oldest event");
            }
            queue.push_back((topic.to_string(), record));
        }
        self.inner.notify.notify_one();
    }

    /// Total events lost to queue overflow since startup.
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Wait until the queue and the in-flight append are empty. Test and
    /// shutdown helper; production callers never wait on publishes.
    pub async fn drain(&self) {
        loop {
            let pending = self.inner.queue.lock().expect("publish queue poisoned").len()
                + self.inner.in_flight.load(Ordering::SeqCst);
            if pending == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}

impl Inner {
    async fn append_with_retry(inner: &Arc<Inner>, topic: &str, record: &EventRecord) {
        let Some(log) = inner.topics.get(topic) else {
            return;
        };
        let mut attempt = 0;
        loop {
            attempt += 1;
            match log.append(record) {
                Ok((partition, _)) => {
                    debug!(
                        topic,
                        partition,
                        event_type = %record.headers.event_type,
                        key = %record.key,
                        "event published"
                    );
                    return;
                }
                Err(e) if attempt < inner.config.max_attempts => {
                    warn!(topic, attempt, error = %e, "event append failed — retrying");
                    tokio::time::sleep(inner.config.retry_backoff).await;
                }
                Err(e) => {
                    warn!(topic, attempt, error = %e, "event append failed — abandoned");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kassa_core::event::EventPayload;
    use kassa_core::types::CustomerId;

    fn customer_created(identification: &str) -> DomainEvent {
        DomainEvent::new(
            uuid::Uuid::new_v4(),
            EventPayload::CustomerCreated {
                customer_id: CustomerId::new(),
                identification: identification.into(),
                name: "Marianela Montalvo".into(),
                active: true,
            },
        )
    }

    #[tokio::test]
    async fn publishes_through_worker() {
        let dir = tempfile::tempdir().unwrap();
        let log = TopicLog::open(dir.path(), "banking.customer.events", 3).unwrap();
        let publisher = EventPublisher::spawn(PublisherConfig::default(), vec![log.clone()]);

        publisher.publish("banking.customer.events", customer_created("A"));
        publisher.publish("banking.customer.events", customer_created("A"));
        publisher.drain().await;

        let p = log.partition_for("A");
        assert_eq!(log.read_from(p, 0, 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let log = TopicLog::open(dir.path(), "banking.customer.events", 1).unwrap();
        let config = PublisherConfig {
            queue_capacity: 2,
            ..PublisherConfig::default()
        };
        // No worker: everything stays queued so the overflow path is
        // deterministic.
        let publisher = EventPublisher::new(config, vec![log.clone()]);

        publisher.publish("banking.customer.events", customer_created("0"));
        publisher.publish("banking.customer.events", customer_created("1"));
        publisher.publish("banking.customer.events", customer_created("2"));
        assert_eq!(publisher.dropped_events(), 1);

        publisher.spawn_worker();
        publisher.drain().await;

        // The oldest event ("0") was dropped; "1" and "2" survived.
        let got = log.read_from(0, 0, 10).unwrap();
        let keys: Vec<_> = got.iter().map(|(_, r)| r.key.clone()).collect();
        assert_eq!(keys, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn unknown_topic_is_discarded_not_queued() {
        let publisher = EventPublisher::new(PublisherConfig::default(), vec![]);
        publisher.publish("banking.customer.events", customer_created("A"));
        publisher.drain().await;
        assert_eq!(publisher.dropped_events(), 0);
    }
}
