//! Buzzline: a weather producer and a buzz consumer connected by one Kafka topic
//!
//! The producer asks a weather source for current conditions on a fixed
//! interval and publishes one text message per cycle. The consumer reads the
//! same topic under a consumer group and labels each message as a weather
//! update or something else.
//!
//! Broker access goes through the traits in [`broker`], with Kafka
//! implementations in [`kafka`] and an in-process broker for tests.

pub mod broker;
pub mod config;
pub mod error;
pub mod kafka;
pub mod message;
pub mod providers;
pub mod services;
pub mod shutdown;
pub mod telemetry;

pub use broker::{Ack, MessagePublisher, MessageSubscription, TopicAdmin, TopicSpec};
pub use config::Config;
pub use error::{
    ConfigError, ConnectError, ConsumeError, DecodeError, FetchError, ProducerError,
    ProvisionError, PublishError, StartupError,
};
pub use message::{weather_message, Message, Payload};
pub use providers::{OpenWeatherClient, WeatherReading, WeatherSource};
pub use services::{
    classify, BuzzConsumer, Category, Classifier, ConsumerReport, ConsumerSettings,
    ProducerReport, ProducerSettings, TopicProvisioner, TopicStatus, WeatherProducer,
};
