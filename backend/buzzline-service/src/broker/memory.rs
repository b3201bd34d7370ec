//! In-process broker implementing the capability traits.
//!
//! Each topic is a single append-only log (partition 0). Consumer groups
//! track their own read position per topic, so a second subscription under
//! the same group continues where the first stopped.

use super::{Ack, MessagePublisher, MessageSubscription, TopicAdmin, TopicSpec};
use crate::error::{ConsumeError, ProvisionError, PublishError};
use crate::message::{Message, Payload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

const PARTITION: i32 = 0;

#[derive(Debug)]
struct StoredRecord {
    payload: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct TopicLog {
    spec: TopicSpec,
    records: Vec<StoredRecord>,
    /// Next offset to deliver, per consumer group
    group_offsets: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct BrokerInner {
    topics: Mutex<HashMap<String, TopicLog>>,
    new_records: Notify,
    shut_down: AtomicBool,
    failing_publishes: AtomicU32,
    publisher_closes: AtomicUsize,
    subscription_closes: AtomicUsize,
}

/// Shared handle; clones refer to the same broker
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new publishing connection
    pub fn publisher(&self) -> InMemoryPublisher {
        InMemoryPublisher {
            inner: self.inner.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// A new subscription to `topic` under `group_id`
    pub fn subscribe(&self, topic: &str, group_id: &str) -> InMemorySubscription {
        InMemorySubscription {
            inner: self.inner.clone(),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            closed: false,
        }
    }

    pub fn topic_spec(&self, topic: &str) -> Option<TopicSpec> {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map(|log| log.spec.clone())
    }

    /// Payloads stored on `topic`, in offset order
    pub fn messages(&self, topic: &str) -> Vec<String> {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map(|log| log.records.iter().map(|r| r.payload.clone()).collect())
            .unwrap_or_default()
    }

    pub fn message_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map(|log| log.records.len())
            .unwrap_or(0)
    }

    /// Make the next `count` publishes fail with a delivery error
    pub fn fail_next_publishes(&self, count: u32) {
        self.inner.failing_publishes.store(count, Ordering::SeqCst);
    }

    /// Move a group's read position back, so already delivered messages are delivered again
    pub fn rewind(&self, topic: &str, group_id: &str, offset: i64) {
        if let Some(log) = self.inner.topics.lock().get_mut(topic) {
            log.group_offsets
                .insert(group_id.to_string(), offset.max(0) as usize);
        }
        self.inner.new_records.notify_waiters();
    }

    /// Stop the broker: subscriptions drain what is left, then end
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        self.inner.new_records.notify_waiters();
    }

    pub fn publisher_closes(&self) -> usize {
        self.inner.publisher_closes.load(Ordering::SeqCst)
    }

    pub fn subscription_closes(&self) -> usize {
        self.inner.subscription_closes.load(Ordering::SeqCst)
    }

    fn take_injected_failure(&self) -> bool {
        self.inner
            .failing_publishes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TopicAdmin for InMemoryBroker {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), ProvisionError> {
        let mut topics = self.inner.topics.lock();
        if topics.contains_key(&spec.name) {
            return Err(ProvisionError::AlreadyExists(spec.name.clone()));
        }

        topics.insert(
            spec.name.clone(),
            TopicLog {
                spec: spec.clone(),
                records: Vec::new(),
                group_offsets: HashMap::new(),
            },
        );
        debug!(topic = %spec.name, "Topic created");
        Ok(())
    }
}

pub struct InMemoryPublisher {
    inner: Arc<BrokerInner>,
    closed: AtomicBool,
}

impl InMemoryPublisher {
    fn broker(&self) -> InMemoryBroker {
        InMemoryBroker {
            inner: self.inner.clone(),
        }
    }
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<Ack, PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::Closed);
        }
        if self.broker().take_injected_failure() {
            return Err(PublishError::Delivery {
                topic: topic.to_string(),
                reason: "Broker: Not enough in-sync replicas".to_string(),
            });
        }

        let offset = {
            let mut topics = self.inner.topics.lock();
            let log = topics
                .get_mut(topic)
                .ok_or_else(|| PublishError::UnknownTopic(topic.to_string()))?;
            log.records.push(StoredRecord {
                payload: payload.to_string(),
                timestamp: Utc::now(),
            });
            (log.records.len() - 1) as i64
        };

        self.inner.new_records.notify_waiters();
        Ok(Ack {
            partition: PARTITION,
            offset,
        })
    }

    async fn close(&self) -> Result<(), PublishError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.inner.publisher_closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

pub struct InMemorySubscription {
    inner: Arc<BrokerInner>,
    topic: String,
    group_id: String,
    closed: bool,
}

impl InMemorySubscription {
    fn poll_record(&self) -> Option<Message> {
        let mut topics = self.inner.topics.lock();
        let log = topics.get_mut(&self.topic)?;
        let position = log.group_offsets.entry(self.group_id.clone()).or_insert(0);
        let record = log.records.get(*position)?;

        let message = Message {
            topic: self.topic.clone(),
            partition: PARTITION,
            offset: *position as i64,
            key: None,
            payload: Some(Payload::Text(record.payload.clone())),
            timestamp: Some(record.timestamp),
        };
        *position += 1;
        Some(message)
    }
}

#[async_trait]
impl MessageSubscription for InMemorySubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn group_id(&self) -> &str {
        &self.group_id
    }

    async fn next_message(&mut self) -> Option<Result<Message, ConsumeError>> {
        loop {
            if self.closed {
                return None;
            }

            // Registered before the check so a publish in between is not missed
            let notified = self.inner.new_records.notified();

            if let Some(message) = self.poll_record() {
                return Some(Ok(message));
            }
            if self.inner.shut_down.load(Ordering::SeqCst) {
                return None;
            }

            notified.await;
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.subscription_closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn broker_with_topic(name: &str) -> InMemoryBroker {
        let broker = InMemoryBroker::new();
        broker.create_topic(&TopicSpec::new(name)).await.unwrap();
        broker
    }

    #[tokio::test]
    async fn test_create_twice_reports_already_exists() {
        let broker = broker_with_topic("buzzline").await;

        let err = broker
            .create_topic(&TopicSpec::new("buzzline").with_partitions(8))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::AlreadyExists(_)));
        assert_eq!(broker.topic_spec("buzzline").unwrap().partitions, 1);
    }

    #[tokio::test]
    async fn test_publish_assigns_increasing_offsets() {
        let broker = broker_with_topic("buzzline").await;
        let publisher = broker.publisher();

        let first = publisher.publish("buzzline", "a").await.unwrap();
        let second = publisher.publish("buzzline", "b").await.unwrap();

        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
        assert_eq!(broker.messages("buzzline"), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_publish_to_unknown_topic_fails() {
        let broker = InMemoryBroker::new();
        let err = broker
            .publisher()
            .publish("missing", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::UnknownTopic(_)));
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let broker = broker_with_topic("buzzline").await;
        let publisher = broker.publisher();
        broker.fail_next_publishes(1);

        assert!(publisher.publish("buzzline", "a").await.is_err());
        assert!(publisher.publish("buzzline", "b").await.is_ok());
        assert_eq!(broker.messages("buzzline"), vec!["b"]);
    }

    #[tokio::test]
    async fn test_closed_publisher_rejects_and_counts_once() {
        let broker = broker_with_topic("buzzline").await;
        let publisher = broker.publisher();

        publisher.close().await.unwrap();
        publisher.close().await.unwrap();

        assert!(matches!(
            publisher.publish("buzzline", "late").await,
            Err(PublishError::Closed)
        ));
        assert_eq!(broker.publisher_closes(), 1);
    }

    #[tokio::test]
    async fn test_subscription_waits_for_publish() {
        let broker = broker_with_topic("buzzline").await;
        let mut subscription = broker.subscribe("buzzline", "group");

        let reader = tokio::spawn(async move { subscription.next_message().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        broker
            .publisher()
            .publish("buzzline", "hello")
            .await
            .unwrap();

        let message = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(message.offset, 0);
        assert_eq!(message.text().unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_groups_track_positions_independently() {
        let broker = broker_with_topic("buzzline").await;
        let publisher = broker.publisher();
        publisher.publish("buzzline", "one").await.unwrap();

        let mut a = broker.subscribe("buzzline", "a");
        let mut b = broker.subscribe("buzzline", "b");

        assert_eq!(a.next_message().await.unwrap().unwrap().offset, 0);
        assert_eq!(b.next_message().await.unwrap().unwrap().offset, 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_then_ends() {
        let broker = broker_with_topic("buzzline").await;
        broker
            .publisher()
            .publish("buzzline", "last")
            .await
            .unwrap();
        broker.shutdown();

        let mut subscription = broker.subscribe("buzzline", "group");
        assert!(subscription.next_message().await.unwrap().is_ok());
        assert!(subscription.next_message().await.is_none());
    }

    #[tokio::test]
    async fn test_rewind_redelivers() {
        let broker = broker_with_topic("buzzline").await;
        broker.publisher().publish("buzzline", "x").await.unwrap();

        let mut subscription = broker.subscribe("buzzline", "group");
        assert_eq!(
            subscription.next_message().await.unwrap().unwrap().offset,
            0
        );

        broker.rewind("buzzline", "group", 0);
        assert_eq!(
            subscription.next_message().await.unwrap().unwrap().offset,
            0
        );
    }
}
