//! Kafka subscription for the buzz topic
use super::verify_brokers;
use crate::broker::MessageSubscription;
use crate::config::Config;
use crate::error::{ConnectError, ConsumeError};
use crate::message::{Message, Payload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::info;

pub struct KafkaSubscription {
    consumer: StreamConsumer,
    topic: String,
    group_id: String,
    closed: bool,
}

impl KafkaSubscription {
    /// Connect under `group_id` and subscribe to `topic`.
    ///
    /// A group with no committed position starts from the earliest offset.
    pub fn connect(
        brokers: &str,
        topic: &str,
        group_id: &str,
        request_timeout: Duration,
    ) -> Result<Self, ConnectError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("enable.partition.eof", "false")
            .set("request.timeout.ms", request_timeout.as_millis().to_string())
            .create()
            .map_err(|e| ConnectError::Client(e.to_string()))?;

        verify_brokers(consumer.client(), brokers, request_timeout)?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| ConnectError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        info!(
            topic = %topic,
            group_id = %group_id,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            closed: false,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConnectError> {
        Self::connect(
            &config.kafka_brokers,
            &config.kafka_topic,
            &config.kafka_consumer_group_id,
            config.request_timeout(),
        )
    }
}

#[async_trait]
impl MessageSubscription for KafkaSubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn group_id(&self) -> &str {
        &self.group_id
    }

    async fn next_message(&mut self) -> Option<Result<Message, ConsumeError>> {
        if self.closed {
            return None;
        }

        match self.consumer.recv().await {
            Ok(borrowed) => Some(Ok(to_message(&borrowed))),
            Err(e) => Some(Err(ConsumeError::Transport(e.to_string()))),
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.consumer.unsubscribe();
            self.closed = true;
        }
    }
}

/// Copy a delivered record out of the client's buffers
fn to_message<M: rdkafka::Message>(record: &M) -> Message {
    Message {
        topic: record.topic().to_string(),
        partition: record.partition(),
        offset: record.offset(),
        key: record.key().map(<[u8]>::to_vec),
        payload: record.payload().map(|bytes| Payload::Bytes(bytes.to_vec())),
        timestamp: record
            .timestamp()
            .to_millis()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
    }
}
