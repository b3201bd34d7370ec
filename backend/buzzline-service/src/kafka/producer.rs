//! Kafka producer for buzz messages
use super::verify_brokers;
use crate::broker::{Ack, MessagePublisher};
use crate::config::Config;
use crate::error::{ConnectError, PublishError};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::info;

/// Kafka producer connection
pub struct KafkaMessagePublisher {
    producer: FutureProducer,
    delivery_timeout: Duration,
}

impl KafkaMessagePublisher {
    /// Create the producer and check that the cluster answers.
    ///
    /// No retry: an unreachable broker is reported straight away.
    pub fn connect(
        brokers: &str,
        request_timeout: Duration,
        delivery_timeout: Duration,
    ) -> Result<Self, ConnectError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("retries", "3")
            .set("linger.ms", "10")
            .set("request.timeout.ms", request_timeout.as_millis().to_string())
            .set("message.timeout.ms", delivery_timeout.as_millis().to_string())
            .create()
            .map_err(|e| ConnectError::Client(e.to_string()))?;

        verify_brokers(producer.client(), brokers, request_timeout)?;

        info!("Kafka producer initialized with brokers: {}", brokers);

        Ok(Self {
            producer,
            delivery_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConnectError> {
        Self::connect(
            &config.kafka_brokers,
            config.request_timeout(),
            config.delivery_timeout(),
        )
    }
}

#[async_trait]
impl MessagePublisher for KafkaMessagePublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<Ack, PublishError> {
        let record: FutureRecord<'_, (), str> = FutureRecord::to(topic).payload(payload);

        match self.producer.send(record, self.delivery_timeout).await {
            Ok((partition, offset)) => Ok(Ack { partition, offset }),
            Err((err, _)) => Err(PublishError::Delivery {
                topic: topic.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    async fn close(&self) -> Result<(), PublishError> {
        let producer = self.producer.clone();
        let timeout = self.delivery_timeout;

        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| PublishError::Flush(e.to_string()))?
            .map_err(|e| PublishError::Flush(e.to_string()))
    }
}
