//! Configuration for the buzzline producer and consumer
use crate::broker::TopicSpec;
use crate::error::ConfigError;
use resilience::{ExponentialBackoff, RetryConfig};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration struct, loaded once from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Kafka broker addresses
    #[serde(default = "default_kafka_brokers")]
    pub kafka_brokers: String,

    /// Topic the producer writes to and the consumer reads from
    #[serde(default = "default_kafka_topic")]
    pub kafka_topic: String,

    /// Consumer group id
    #[serde(default = "default_consumer_group_id")]
    pub kafka_consumer_group_id: String,

    /// Partitions used when the topic has to be created
    #[serde(default = "default_topic_partitions")]
    pub kafka_topic_partitions: i32,

    /// Replication factor used when the topic has to be created
    #[serde(default = "default_replication_factor")]
    pub kafka_replication_factor: i32,

    /// Timeout for metadata and admin requests
    #[serde(default = "default_request_timeout_ms")]
    pub kafka_request_timeout_ms: u64,

    /// How long a single publish may wait for the broker acknowledgement
    #[serde(default = "default_delivery_timeout_ms")]
    pub kafka_delivery_timeout_ms: u64,

    /// Seconds between generated messages
    #[serde(default = "default_message_interval_seconds")]
    pub message_interval_seconds: u64,

    /// Location key passed to the weather source
    #[serde(default = "default_city")]
    pub city: String,

    /// OpenWeather API key
    #[serde(default)]
    pub openweather_api_key: String,

    /// OpenWeather current weather endpoint
    #[serde(default = "default_openweather_base_url")]
    pub openweather_base_url: String,

    /// HTTP timeout for the weather call
    #[serde(default = "default_openweather_timeout_secs")]
    pub openweather_timeout_secs: u64,

    /// Retries on top of the first publish attempt within one cycle
    #[serde(default = "default_publish_max_retries")]
    pub publish_max_retries: u32,

    /// Initial backoff between publish retries
    #[serde(default = "default_publish_retry_backoff_ms")]
    pub publish_retry_backoff_ms: u64,

    /// Stop producing after more than this many failed cycles in a row (0 = never)
    #[serde(default = "default_max_consecutive_publish_failures")]
    pub max_consecutive_publish_failures: u32,

    /// Initial backoff after a consumer transport error
    #[serde(default = "default_consumer_retry_backoff_ms")]
    pub consumer_retry_backoff_ms: u64,

    /// Ceiling for the consumer transport error backoff
    #[serde(default = "default_consumer_max_retry_backoff_ms")]
    pub consumer_max_retry_backoff_ms: u64,

    /// Substring that marks a message as relevant
    #[serde(default = "default_relevance_marker")]
    pub relevance_marker: String,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_kafka_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_kafka_topic() -> String {
    "buzzline".to_string()
}

fn default_consumer_group_id() -> String {
    "default_group".to_string()
}

fn default_topic_partitions() -> i32 {
    1
}

fn default_replication_factor() -> i32 {
    1
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_delivery_timeout_ms() -> u64 {
    30_000
}

fn default_message_interval_seconds() -> u64 {
    60
}

fn default_city() -> String {
    "Oslo".to_string()
}

fn default_openweather_base_url() -> String {
    "http://api.openweathermap.org/data/2.5/weather".to_string()
}

fn default_openweather_timeout_secs() -> u64 {
    10
}

fn default_publish_max_retries() -> u32 {
    2
}

fn default_publish_retry_backoff_ms() -> u64 {
    200
}

fn default_max_consecutive_publish_failures() -> u32 {
    10
}

fn default_consumer_retry_backoff_ms() -> u64 {
    100
}

fn default_consumer_max_retry_backoff_ms() -> u64 {
    30_000
}

fn default_relevance_marker() -> String {
    "Weather".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kafka_brokers: default_kafka_brokers(),
            kafka_topic: default_kafka_topic(),
            kafka_consumer_group_id: default_consumer_group_id(),
            kafka_topic_partitions: default_topic_partitions(),
            kafka_replication_factor: default_replication_factor(),
            kafka_request_timeout_ms: default_request_timeout_ms(),
            kafka_delivery_timeout_ms: default_delivery_timeout_ms(),
            message_interval_seconds: default_message_interval_seconds(),
            city: default_city(),
            openweather_api_key: String::new(),
            openweather_base_url: default_openweather_base_url(),
            openweather_timeout_secs: default_openweather_timeout_secs(),
            publish_max_retries: default_publish_max_retries(),
            publish_retry_backoff_ms: default_publish_retry_backoff_ms(),
            max_consecutive_publish_failures: default_max_consecutive_publish_failures(),
            consumer_retry_backoff_ms: default_consumer_retry_backoff_ms(),
            consumer_max_retry_backoff_ms: default_consumer_max_retry_backoff_ms(),
            relevance_marker: default_relevance_marker(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Config = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from explicit key/value pairs (same names as the environment)
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs.into_iter().map(|(k, v)| (k.into(), v.into()));
        let config: Config = envy::from_iter(pairs)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_empty = [
            ("KAFKA_BROKERS", &self.kafka_brokers),
            ("KAFKA_TOPIC", &self.kafka_topic),
            ("KAFKA_CONSUMER_GROUP_ID", &self.kafka_consumer_group_id),
            ("CITY", &self.city),
            ("RELEVANCE_MARKER", &self.relevance_marker),
        ];
        for (name, value) in non_empty {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }

        if self.message_interval_seconds < 1 {
            return Err(ConfigError::Invalid(
                "MESSAGE_INTERVAL_SECONDS must be at least 1".to_string(),
            ));
        }
        if self.kafka_topic_partitions < 1 || self.kafka_replication_factor < 1 {
            return Err(ConfigError::Invalid(
                "KAFKA_TOPIC_PARTITIONS and KAFKA_REPLICATION_FACTOR must be at least 1"
                    .to_string(),
            ));
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(ConfigError::Invalid(format!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            )));
        }

        Ok(())
    }

    pub fn message_interval(&self) -> Duration {
        Duration::from_secs(self.message_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_request_timeout_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_delivery_timeout_ms)
    }

    pub fn openweather_timeout(&self) -> Duration {
        Duration::from_secs(self.openweather_timeout_secs)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }

    /// Topic definition used when provisioning
    pub fn topic_spec(&self) -> TopicSpec {
        TopicSpec::new(self.kafka_topic.clone())
            .with_partitions(self.kafka_topic_partitions)
            .with_replication_factor(self.kafka_replication_factor)
    }

    /// Per-cycle publish retry policy
    pub fn publish_retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.publish_max_retries,
            initial_backoff: Duration::from_millis(self.publish_retry_backoff_ms),
            ..resilience::kafka_publish_retry()
        }
    }

    /// Backoff applied after consumer transport errors
    pub fn consumer_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.consumer_retry_backoff_ms),
            Duration::from_millis(self.consumer_max_retry_backoff_ms),
        )
    }
}
