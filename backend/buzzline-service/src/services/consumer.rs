//! Buzz consumer: reads the topic in delivery order and classifies each message
use crate::broker::MessageSubscription;
use crate::config::Config;
use crate::error::DecodeError;
use crate::message::Message;
use crate::services::classifier::{Category, Classifier};
use crate::shutdown::ShutdownSignal;
use resilience::ExponentialBackoff;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Disconnected,
    Subscribed,
    Polling,
    Closing,
    Closed,
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub classifier: Classifier,
    pub poll_backoff: ExponentialBackoff,
}

impl ConsumerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            classifier: Classifier::new(config.relevance_marker.clone()),
            poll_backoff: config.consumer_backoff(),
        }
    }
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            classifier: Classifier::default(),
            poll_backoff: resilience::kafka_poll_backoff(),
        }
    }
}

/// What happened to one delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processed {
    Classified(Category),
    /// Offset already processed on this partition (at-least-once redelivery)
    Duplicate,
}

/// Counters for one consumer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub received: u64,
    pub relevant: u64,
    pub other: u64,
    pub skipped: u64,
    pub duplicates: u64,
    pub transport_errors: u64,
}

pub struct BuzzConsumer<S: MessageSubscription> {
    subscription: S,
    classifier: Classifier,
    backoff: ExponentialBackoff,
    /// Highest offset processed per partition
    processed_offsets: HashMap<i32, i64>,
    state: ConsumerState,
}

impl<S: MessageSubscription> BuzzConsumer<S> {
    /// Wrap an already subscribed connection
    pub fn new(subscription: S, settings: ConsumerSettings) -> Self {
        Self {
            subscription,
            classifier: settings.classifier,
            backoff: settings.poll_backoff,
            processed_offsets: HashMap::new(),
            state: ConsumerState::Subscribed,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Consume until shutdown or until the subscription ends, then close it
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> ConsumerReport {
        self.transition(ConsumerState::Polling);
        info!(
            topic = %self.subscription.topic(),
            group_id = %self.subscription.group_id(),
            marker = %self.classifier.marker(),
            "Polling messages from topic '{}'...",
            self.subscription.topic()
        );

        let report = self.consume(&mut shutdown).await;

        self.transition(ConsumerState::Closing);
        self.subscription.close().await;
        self.transition(ConsumerState::Closed);
        info!(
            topic = %self.subscription.topic(),
            "Kafka consumer for topic '{}' closed.",
            self.subscription.topic()
        );

        report
    }

    async fn consume(&mut self, shutdown: &mut ShutdownSignal) -> ConsumerReport {
        let mut report = ConsumerReport::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    warn!("Consumer interrupted.");
                    break;
                }
                next = self.subscription.next_message() => next,
            };

            match next {
                Some(Ok(message)) => {
                    self.backoff.reset();
                    report.received += 1;

                    match self.handle_message(&message) {
                        Ok(Processed::Classified(Category::Relevant)) => report.relevant += 1,
                        Ok(Processed::Classified(Category::Other)) => report.other += 1,
                        Ok(Processed::Duplicate) => report.duplicates += 1,
                        Err(e) => {
                            report.skipped += 1;
                            warn!(
                                topic = %message.topic,
                                partition = message.partition,
                                offset = message.offset,
                                error = %e,
                                "Skipping undecodable message"
                            );
                        }
                    }
                }
                Some(Err(e)) => {
                    report.transport_errors += 1;
                    let delay = self.backoff.next_delay();
                    error!(
                        topic = %self.subscription.topic(),
                        error = %e,
                        backoff_ms = delay.as_millis() as u64,
                        "Error while consuming messages"
                    );

                    tokio::select! {
                        biased;
                        _ = shutdown.triggered() => {
                            warn!("Consumer interrupted.");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => {
                    info!(
                        topic = %self.subscription.topic(),
                        "Subscription closed, no more messages"
                    );
                    break;
                }
            }
        }

        report
    }

    /// Decode, de-duplicate and classify one message
    pub fn handle_message(&mut self, message: &Message) -> Result<Processed, DecodeError> {
        if let Some(&last) = self.processed_offsets.get(&message.partition) {
            if message.offset <= last {
                debug!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    last_processed = last,
                    "Duplicate delivery, already processed"
                );
                return Ok(Processed::Duplicate);
            }
        }
        self.processed_offsets.insert(message.partition, message.offset);

        let text = message.text()?;
        debug!(
            partition = message.partition,
            offset = message.offset,
            "Received message at offset {}: {}",
            message.offset,
            text
        );

        info!("Processing message: {}", text);
        let category = self.classifier.classify(&text);
        match category {
            Category::Relevant => info!(
                offset = message.offset,
                category = %category,
                "Weather update: {}",
                text
            ),
            Category::Other => warn!(
                offset = message.offset,
                category = %category,
                "Non-weather message received: {}",
                text
            ),
        }

        Ok(Processed::Classified(category))
    }

    fn transition(&mut self, next: ConsumerState) {
        debug!(from = ?self.state, to = ?next, "Consumer state change");
        self.state = next;
    }
}
