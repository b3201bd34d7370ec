/// Resilience patterns for the broker clients
///
/// This library provides the small set of recovery primitives the pipeline needs:
/// - **Retry**: Bounded exponential backoff with jitter for transient failures
/// - **Backoff**: Capped doubling delay for long-running poll loops
/// - **Preset Configurations**: Pre-tuned settings for Kafka produce and poll
///
/// # Example: Kafka publish with retry
///
/// ```rust,no_run
/// use resilience::{presets, with_retry};
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::kafka_publish_retry();
///
///     let result = with_retry(&config, |_attempt| async {
///         // Your produce call here
///         Ok::<_, String>(())
///     }).await;
/// }
/// ```

pub mod backoff;
pub mod presets;
pub mod retry;

// Re-export main types for convenience
pub use backoff::ExponentialBackoff;
pub use presets::{kafka_poll_backoff, kafka_publish_retry};
pub use retry::{with_retry, RetryConfig, RetryError};
