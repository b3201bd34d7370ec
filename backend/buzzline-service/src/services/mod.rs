//! Buzzline business logic

pub mod classifier;
pub mod consumer;
pub mod producer;
pub mod provisioner;

pub use classifier::{classify, Category, Classifier};
pub use consumer::{BuzzConsumer, ConsumerReport, ConsumerSettings, ConsumerState, Processed};
pub use producer::{ProducerReport, ProducerSettings, ProducerState, WeatherProducer};
pub use provisioner::{TopicProvisioner, TopicStatus};
