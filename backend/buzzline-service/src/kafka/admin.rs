//! Topic administration through the Kafka admin API
use super::verify_brokers;
use crate::broker::{TopicAdmin, TopicSpec};
use crate::config::Config;
use crate::error::{ConnectError, ProvisionError};
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::debug;

pub struct KafkaTopicAdmin {
    admin: AdminClient<DefaultClientContext>,
    operation_timeout: Duration,
}

impl KafkaTopicAdmin {
    pub fn new(brokers: &str, request_timeout: Duration) -> Result<Self, ConnectError> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("request.timeout.ms", request_timeout.as_millis().to_string())
            .create()
            .map_err(|e| ConnectError::Client(e.to_string()))?;

        verify_brokers(admin.inner(), brokers, request_timeout)?;

        Ok(Self {
            admin,
            operation_timeout: request_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConnectError> {
        Self::new(&config.kafka_brokers, config.request_timeout())
    }
}

#[async_trait]
impl TopicAdmin for KafkaTopicAdmin {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), ProvisionError> {
        let new_topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication_factor),
        );
        let timeout = self.operation_timeout;
        let options = AdminOptions::new().operation_timeout(Some(timeout));

        let results = self
            .admin
            .create_topics([&new_topic], &options)
            .await
            .map_err(|e| ProvisionError::Broker {
                topic: spec.name.clone(),
                reason: e.to_string(),
            })?;

        for result in results {
            match result {
                Ok(name) => debug!(topic = %name, "CreateTopics succeeded"),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    return Err(ProvisionError::AlreadyExists(name));
                }
                Err((name, code)) => {
                    return Err(ProvisionError::Broker {
                        topic: name,
                        reason: code.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
