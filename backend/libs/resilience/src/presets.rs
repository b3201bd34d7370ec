/// Preset retry policies for the broker clients
use crate::backoff::ExponentialBackoff;
use crate::retry::RetryConfig;
use std::time::Duration;

/// Kafka produce calls
///
/// - 2 retries on top of the first send
/// - 200ms initial backoff, doubling, capped at 5s
/// - Jitter on, so restarted producers do not retry in lockstep
pub fn kafka_publish_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(200),
        max_backoff: Duration::from_secs(5),
        backoff_multiplier: 2.0,
        jitter: true,
    }
}

/// Kafka poll errors on the consumer side
///
/// - 100ms after the first error, doubling up to 30s
pub fn kafka_poll_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(30))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kafka_publish_retry() {
        let config = kafka_publish_retry();
        assert_eq!(config.max_attempts(), 3);
        assert!(config.initial_backoff < config.max_backoff);
    }

    #[test]
    fn test_kafka_poll_backoff_starts_at_initial() {
        let mut backoff = kafka_poll_backoff();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
