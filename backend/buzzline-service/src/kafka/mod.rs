//! Kafka implementations of the broker capabilities
//!
//! - Admin: idempotent topic creation
//! - Producer: keyless publishes with delivery acknowledgement
//! - Consumer: single-topic subscription under a consumer group

pub mod admin;
pub mod consumer;
pub mod producer;

pub use admin::KafkaTopicAdmin;
pub use consumer::KafkaSubscription;
pub use producer::KafkaMessagePublisher;

use crate::error::ConnectError;
use rdkafka::client::{Client, ClientContext};
use std::time::Duration;

/// Fetch cluster metadata once to make sure at least one broker answers
pub(crate) fn verify_brokers<C: ClientContext>(
    client: &Client<C>,
    brokers: &str,
    timeout: Duration,
) -> Result<(), ConnectError> {
    let metadata = client
        .fetch_metadata(None, timeout)
        .map_err(|e| ConnectError::Unreachable {
            brokers: brokers.to_string(),
            reason: e.to_string(),
        })?;

    if metadata.brokers().is_empty() {
        return Err(ConnectError::Unreachable {
            brokers: brokers.to_string(),
            reason: "No Kafka brokers available".to_string(),
        });
    }

    Ok(())
}
