//! Interval-paced weather buzz producer
//!
//! Each cycle fetches one reading, formats exactly one message (a fallback
//! when the reading is absent), publishes it with bounded retry and then
//! sleeps for the configured interval. The publisher is closed exactly once
//! when the loop ends, whatever the reason.

use crate::broker::{Ack, MessagePublisher};
use crate::config::Config;
use crate::error::{ProducerError, PublishError};
use crate::message::weather_message;
use crate::providers::WeatherSource;
use crate::shutdown::ShutdownSignal;
use resilience::{with_retry, RetryConfig, RetryError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Disconnected,
    Connected,
    Producing,
    Closing,
    Closed,
}

#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub topic: String,
    pub location: String,
    pub interval: Duration,
    pub publish_retry: RetryConfig,
    /// Stop after more than this many failed cycles in a row; 0 never stops
    pub max_consecutive_failures: u32,
}

impl ProducerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            topic: config.kafka_topic.clone(),
            location: config.city.clone(),
            interval: config.message_interval(),
            publish_retry: config.publish_retry(),
            max_consecutive_failures: config.max_consecutive_publish_failures,
        }
    }
}

/// Counters for one producer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerReport {
    pub cycles: u64,
    pub published: u64,
    pub fallbacks: u64,
    pub failed_publishes: u64,
}

pub struct WeatherProducer<P: MessagePublisher, S: WeatherSource> {
    publisher: P,
    source: S,
    settings: ProducerSettings,
    state: ProducerState,
}

impl<P: MessagePublisher, S: WeatherSource> WeatherProducer<P, S> {
    /// Wrap an already connected publisher
    pub fn new(publisher: P, source: S, settings: ProducerSettings) -> Self {
        Self {
            publisher,
            source,
            settings,
            state: ProducerState::Connected,
        }
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    /// Produce until shutdown (or too many consecutive failures), then close
    pub async fn run(
        mut self,
        mut shutdown: ShutdownSignal,
    ) -> Result<ProducerReport, ProducerError> {
        self.transition(ProducerState::Producing);
        info!(
            topic = %self.settings.topic,
            location = %self.settings.location,
            interval_secs = self.settings.interval.as_secs(),
            "Starting message production"
        );

        let outcome = self.produce(&mut shutdown).await;

        self.transition(ProducerState::Closing);
        if let Err(e) = self.publisher.close().await {
            warn!(topic = %self.settings.topic, error = %e, "Error while closing Kafka producer");
        }
        self.transition(ProducerState::Closed);
        info!("Kafka producer closed.");

        outcome
    }

    async fn produce(
        &mut self,
        shutdown: &mut ShutdownSignal,
    ) -> Result<ProducerReport, ProducerError> {
        let mut report = ProducerReport::default();
        let mut consecutive_failures = 0u32;

        loop {
            if shutdown.is_triggered() {
                warn!("Producer interrupted.");
                break;
            }

            let reading = tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    warn!("Producer interrupted.");
                    break;
                }
                reading = self.source.fetch(&self.settings.location) => reading,
            };

            if reading.is_none() {
                report.fallbacks += 1;
            }
            let message = weather_message(&self.settings.location, reading.as_ref());
            report.cycles += 1;
            info!(message = %message, "Generated buzz");

            let result = tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    warn!("Producer interrupted while waiting for acknowledgement.");
                    break;
                }
                result = self.publish_with_retry(&message) => result,
            };

            match result {
                Ok(ack) => {
                    if consecutive_failures > 0 {
                        info!(
                            topic = %self.settings.topic,
                            recovered_after = consecutive_failures,
                            "Publishing recovered after failures"
                        );
                    }
                    consecutive_failures = 0;
                    report.published += 1;
                    info!(
                        topic = %self.settings.topic,
                        partition = ack.partition,
                        offset = ack.offset,
                        "Sent message to topic '{}': {}",
                        self.settings.topic,
                        message
                    );
                }
                Err(e) => {
                    consecutive_failures += 1;
                    report.failed_publishes += 1;
                    error!(
                        topic = %self.settings.topic,
                        attempts = e.attempts(),
                        consecutive_failures = consecutive_failures,
                        error = %e,
                        "Failed to publish message, will retry on next interval"
                    );

                    let limit = self.settings.max_consecutive_failures;
                    if limit > 0 && consecutive_failures > limit {
                        error!(
                            topic = %self.settings.topic,
                            consecutive_failures = consecutive_failures,
                            limit = limit,
                            "Too many consecutive publish failures, stopping producer"
                        );
                        return Err(ProducerError::TooManyFailures {
                            consecutive: consecutive_failures,
                            last_error: e.into_last_error(),
                        });
                    }
                }
            }

            debug!(
                interval_secs = self.settings.interval.as_secs(),
                "Waiting for next cycle"
            );
            tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    warn!("Producer interrupted.");
                    break;
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        Ok(report)
    }

    async fn publish_with_retry(&self, payload: &str) -> Result<Ack, RetryError<PublishError>> {
        let publisher = &self.publisher;
        let topic = self.settings.topic.as_str();

        with_retry(&self.settings.publish_retry, move |_attempt| {
            publisher.publish(topic, payload)
        })
        .await
    }

    fn transition(&mut self, next: ProducerState) {
        debug!(from = ?self.state, to = ?next, "Producer state change");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{InMemoryBroker, TopicAdmin, TopicSpec};
    use crate::providers::{MockWeatherSource, WeatherReading};
    use crate::shutdown;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn settings(max_consecutive_failures: u32) -> ProducerSettings {
        ProducerSettings {
            topic: "buzzline".to_string(),
            location: "Oslo".to_string(),
            interval: Duration::from_secs(1),
            publish_retry: RetryConfig::no_retry(),
            max_consecutive_failures,
        }
    }

    async fn broker() -> InMemoryBroker {
        let broker = InMemoryBroker::new();
        broker
            .create_topic(&TopicSpec::new("buzzline"))
            .await
            .unwrap();
        broker
    }

    async fn wait_for_messages(broker: &InMemoryBroker, count: usize) {
        while broker.message_count("buzzline") < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_formatted_reading() {
        let broker = broker().await;
        let mut source = MockWeatherSource::new();
        source.expect_fetch().returning(|_| {
            Some(WeatherReading {
                description: "clear sky".to_string(),
                value: serde_json::Number::from_f64(5.2).unwrap(),
            })
        });

        let (trigger, signal) = shutdown::channel();
        let producer = WeatherProducer::new(broker.publisher(), source, settings(0));
        let handle = tokio::spawn(producer.run(signal));

        wait_for_messages(&broker, 1).await;
        trigger.trigger();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(
            broker.messages("buzzline"),
            vec!["Weather in Oslo: clear sky, Temp: 5.2°C"]
        );
        assert_eq!(report.published, 1);
        assert_eq!(report.fallbacks, 0);
        assert_eq!(broker.publisher_closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_reading_publishes_one_fallback_per_cycle() {
        let broker = broker().await;
        let mut source = MockWeatherSource::new();
        source.expect_fetch().returning(|_| None);

        let (trigger, signal) = shutdown::channel();
        let producer = WeatherProducer::new(broker.publisher(), source, settings(0));
        let handle = tokio::spawn(producer.run(signal));

        wait_for_messages(&broker, 2).await;
        trigger.trigger();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(
            broker.messages("buzzline"),
            vec![
                "Could not retrieve weather data for Oslo.",
                "Could not retrieve weather data for Oslo."
            ]
        );
        assert_eq!(report.cycles, 2);
        assert_eq!(report.fallbacks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_paces_cycles() {
        let broker = broker().await;
        let mut source = MockWeatherSource::new();
        source.expect_fetch().returning(|_| None);

        let (trigger, signal) = shutdown::channel();
        let producer = WeatherProducer::new(broker.publisher(), source, settings(0));
        let start = tokio::time::Instant::now();
        let handle = tokio::spawn(producer.run(signal));

        wait_for_messages(&broker, 3).await;
        let elapsed = start.elapsed();
        trigger.trigger();
        handle.await.unwrap().unwrap();

        // Cycles at t=0s, 1s, 2s
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_does_not_stop_loop() {
        let broker = broker().await;
        broker.fail_next_publishes(1);
        let mut source = MockWeatherSource::new();
        source.expect_fetch().returning(|_| None);

        let (trigger, signal) = shutdown::channel();
        let producer = WeatherProducer::new(broker.publisher(), source, settings(5));
        let handle = tokio::spawn(producer.run(signal));

        wait_for_messages(&broker, 1).await;
        trigger.trigger();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.failed_publishes, 1);
        assert_eq!(report.published, 1);
        assert_eq!(report.cycles, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_within_cycle() {
        let broker = broker().await;
        broker.fail_next_publishes(2);
        let mut source = MockWeatherSource::new();
        source.expect_fetch().times(1).returning(|_| None);

        let mut settings = settings(0);
        settings.publish_retry = RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(10),
            jitter: false,
            ..Default::default()
        };

        let (trigger, signal) = shutdown::channel();
        let producer = WeatherProducer::new(broker.publisher(), source, settings);
        let handle = tokio::spawn(producer.run(signal));

        wait_for_messages(&broker, 1).await;
        trigger.trigger();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.published, 1);
        assert_eq!(report.failed_publishes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_failure_limit_stops_and_closes() {
        let broker = broker().await;
        broker.fail_next_publishes(u32::MAX);
        let mut source = MockWeatherSource::new();
        source.expect_fetch().returning(|_| None);

        let (_trigger, signal) = shutdown::channel();
        let producer = WeatherProducer::new(broker.publisher(), source, settings(2));

        let err = producer.run(signal).await.unwrap_err();

        match err {
            ProducerError::TooManyFailures { consecutive, .. } => assert_eq!(consecutive, 3),
        }
        assert_eq!(broker.publisher_closes(), 1);
        assert!(broker.messages("buzzline").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_start_closes_once_without_publishing() {
        let broker = broker().await;
        let mut source = MockWeatherSource::new();
        source.expect_fetch().never();

        let (trigger, signal) = shutdown::channel();
        trigger.trigger();

        let producer = WeatherProducer::new(broker.publisher(), source, settings(0));
        let report = producer.run(signal).await.unwrap();

        assert_eq!(report, ProducerReport::default());
        assert_eq!(broker.publisher_closes(), 1);
    }

    #[test]
    fn test_new_producer_is_connected() {
        let broker = InMemoryBroker::new();
        let producer = WeatherProducer::new(
            broker.publisher(),
            MockWeatherSource::new(),
            settings(0),
        );
        assert_eq!(producer.state(), ProducerState::Connected);
    }

    /// Fetch that never completes
    struct StalledSource;

    #[async_trait]
    impl WeatherSource for StalledSource {
        async fn fetch(&self, _location: &str) -> Option<WeatherReading> {
            std::future::pending().await
        }
    }

    /// Publisher whose acknowledgement never arrives
    #[derive(Default)]
    struct StalledPublisher {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MessagePublisher for StalledPublisher {
        async fn publish(&self, _topic: &str, _payload: &str) -> Result<Ack, PublishError> {
            std::future::pending().await
        }

        async fn close(&self) -> Result<(), PublishError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_pending_fetch_closes_once() {
        let broker = broker().await;

        let (trigger, signal) = shutdown::channel();
        let producer = WeatherProducer::new(broker.publisher(), StalledSource, settings(0));
        let handle = tokio::spawn(producer.run(signal));

        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.trigger();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report, ProducerReport::default());
        assert!(broker.messages("buzzline").is_empty());
        assert_eq!(broker.publisher_closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_pending_ack_closes_once() {
        let publisher = StalledPublisher::default();
        let closes = publisher.closes.clone();
        let mut source = MockWeatherSource::new();
        source.expect_fetch().times(1).returning(|_| None);

        let (trigger, signal) = shutdown::channel();
        let producer = WeatherProducer::new(publisher, source, settings(0));
        let handle = tokio::spawn(producer.run(signal));

        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.trigger();
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.cycles, 1);
        assert_eq!(report.published, 0);
        assert_eq!(report.failed_publishes, 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
