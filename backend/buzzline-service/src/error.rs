//! Error taxonomy for the buzzline producer and consumer.
//!
//! Startup failures (`ConfigError`, `ConnectError`, `ProvisionError`) end the
//! process with a distinct exit code. Everything raised per cycle or per
//! message is handled at the loop boundary and never terminates a process.

use std::str::Utf8Error;
use thiserror::Error;

/// Configuration could not be loaded or failed validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Broker connection could not be established
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Failed to create Kafka client: {0}")]
    Client(String),

    #[error("Kafka broker unreachable at {brokers}: {reason}")]
    Unreachable { brokers: String, reason: String },

    #[error("Failed to subscribe to topic '{topic}': {reason}")]
    Subscribe { topic: String, reason: String },
}

/// Topic could not be provisioned
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Invalid topic name: {0:?}")]
    InvalidTopicName(String),

    /// Reported by the broker admin API; the provisioner treats it as success
    #[error("Topic '{0}' already exists")]
    AlreadyExists(String),

    #[error("Failed to create topic '{topic}': {reason}")]
    Broker { topic: String, reason: String },
}

/// A single publish attempt failed
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("Delivery to topic '{topic}' failed: {reason}")]
    Delivery { topic: String, reason: String },

    #[error("Topic '{0}' does not exist")]
    UnknownTopic(String),

    #[error("Producer is closed")]
    Closed,

    #[error("Failed to flush producer: {0}")]
    Flush(String),
}

/// Upstream data source call failed; converted to an absent datum by callers
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Response is missing field '{0}'")]
    MissingField(&'static str),
}

/// A consumed message could not be turned into text
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Message at {topic}[{partition}]@{offset} has no payload")]
    EmptyPayload {
        topic: String,
        partition: i32,
        offset: i64,
    },

    #[error("Message at {topic}[{partition}]@{offset} is not valid UTF-8: {source}")]
    InvalidUtf8 {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: Utf8Error,
    },
}

/// Transport-level error while waiting for the next message
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("Kafka consumer error: {0}")]
    Transport(String),
}

/// Fatal outcome of the production loop
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("Stopped after {consecutive} consecutive failed publishes (last: {last_error})")]
    TooManyFailures {
        consecutive: u32,
        last_error: PublishError,
    },
}

/// Anything that ends a process with a non-zero exit code
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("Failed to initialise weather client: {0}")]
    DataSource(#[from] FetchError),

    #[error(transparent)]
    Producer(#[from] ProducerError),
}

impl StartupError {
    /// Process exit code for this failure class
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Provision(_) => 1,
            StartupError::Config(_) => 2,
            StartupError::Connect(_) => 3,
            StartupError::Producer(_) => 4,
            StartupError::DataSource(_) => 5,
        }
    }
}
