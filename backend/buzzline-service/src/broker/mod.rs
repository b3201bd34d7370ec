//! Broker capability interfaces.
//!
//! The producer and consumer loops only see these traits. `crate::kafka`
//! implements them on top of rdkafka; [`memory::InMemoryBroker`] implements
//! them in-process for tests.

pub mod memory;

use crate::error::{ConsumeError, ProvisionError, PublishError};
use crate::message::Message;
use async_trait::async_trait;

pub use memory::{InMemoryBroker, InMemoryPublisher, InMemorySubscription};

/// Topic definition sent to the admin API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
}

impl TopicSpec {
    /// Single partition, replication factor 1
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: 1,
            replication_factor: 1,
        }
    }

    pub fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_replication_factor(mut self, replication_factor: i32) -> Self {
        self.replication_factor = replication_factor;
        self
    }
}

/// Broker acknowledgement of a published message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub partition: i32,
    pub offset: i64,
}

/// Topic administration
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Create a topic.
    ///
    /// Must return [`ProvisionError::AlreadyExists`] when the broker reports
    /// the topic is already there, so callers can treat it as success.
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), ProvisionError>;
}

/// Publishing side of a broker connection
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Send one keyless message and wait for the acknowledgement
    async fn publish(&self, topic: &str, payload: &str) -> Result<Ack, PublishError>;

    /// Flush pending sends and release the connection
    async fn close(&self) -> Result<(), PublishError>;
}

/// Consuming side: one subscription to one topic under one group
#[async_trait]
pub trait MessageSubscription: Send {
    fn topic(&self) -> &str;

    fn group_id(&self) -> &str;

    /// Wait for the next message.
    ///
    /// `None` means the subscription is closed and will not yield again.
    async fn next_message(&mut self) -> Option<Result<Message, ConsumeError>>;

    /// Release the subscription and its connection
    async fn close(&mut self);
}
