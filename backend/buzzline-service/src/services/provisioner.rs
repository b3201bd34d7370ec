//! Idempotent topic provisioning
use crate::broker::{TopicAdmin, TopicSpec};
use crate::error::ProvisionError;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicStatus {
    Created,
    AlreadyExists,
}

/// Makes sure a topic exists before anything is produced to it
pub struct TopicProvisioner<A: TopicAdmin> {
    admin: A,
}

impl<A: TopicAdmin> TopicProvisioner<A> {
    pub fn new(admin: A) -> Self {
        Self { admin }
    }

    /// Create `name` with one partition and replication factor 1 unless it already exists
    pub async fn ensure_topic(&self, name: &str) -> Result<TopicStatus, ProvisionError> {
        self.ensure(&TopicSpec::new(name)).await
    }

    /// Create the topic described by `spec` unless it already exists.
    ///
    /// An existing topic is left untouched and reported as
    /// [`TopicStatus::AlreadyExists`]; any other broker error is returned.
    pub async fn ensure(&self, spec: &TopicSpec) -> Result<TopicStatus, ProvisionError> {
        if spec.name.trim().is_empty() {
            return Err(ProvisionError::InvalidTopicName(spec.name.clone()));
        }

        match self.admin.create_topic(spec).await {
            Ok(()) => {
                info!(
                    topic = %spec.name,
                    partitions = spec.partitions,
                    replication_factor = spec.replication_factor,
                    "Kafka topic created"
                );
                Ok(TopicStatus::Created)
            }
            Err(ProvisionError::AlreadyExists(_)) => {
                info!(topic = %spec.name, "Kafka topic already exists");
                Ok(TopicStatus::AlreadyExists)
            }
            Err(e) => {
                error!(topic = %spec.name, error = %e, "Failed to create or verify topic");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use async_trait::async_trait;

    struct DeniedAdmin;

    #[async_trait]
    impl TopicAdmin for DeniedAdmin {
        async fn create_topic(&self, spec: &TopicSpec) -> Result<(), ProvisionError> {
            Err(ProvisionError::Broker {
                topic: spec.name.clone(),
                reason: "Broker: Topic authorization failed".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_second_call_is_idempotent() {
        let broker = InMemoryBroker::new();
        let provisioner = TopicProvisioner::new(broker.clone());
        let spec = TopicSpec::new("buzzline").with_partitions(3);

        assert_eq!(
            provisioner.ensure(&spec).await.unwrap(),
            TopicStatus::Created
        );
        let spec_after_first = broker.topic_spec("buzzline").unwrap();

        assert_eq!(
            provisioner.ensure_topic("buzzline").await.unwrap(),
            TopicStatus::AlreadyExists
        );
        assert_eq!(broker.topic_spec("buzzline").unwrap(), spec_after_first);
        assert_eq!(spec_after_first.partitions, 3);
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected_before_broker_call() {
        let provisioner = TopicProvisioner::new(DeniedAdmin);

        let err = provisioner.ensure_topic("   ").await.unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidTopicName(_)));
    }

    #[tokio::test]
    async fn test_other_broker_errors_are_surfaced() {
        let provisioner = TopicProvisioner::new(DeniedAdmin);

        let err = provisioner.ensure_topic("buzzline").await.unwrap_err();
        assert!(matches!(err, ProvisionError::Broker { .. }));
    }
}
