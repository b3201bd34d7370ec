//! Buzz consumer - Main entry point
//!
//! Reads the configured topic under the configured consumer group and logs
//! each message as a weather update or as something else.

use buzzline_service::kafka::KafkaSubscription;
use buzzline_service::shutdown::{self, listen_for_signals};
use buzzline_service::telemetry::{init_tracing, DEFAULT_DIRECTIVES};
use buzzline_service::{BuzzConsumer, Config, ConsumerSettings, StartupError};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(DEFAULT_DIRECTIVES, false);
            let err = StartupError::from(e);
            error!(error = %err, "Invalid configuration");
            std::process::exit(err.exit_code());
        }
    };
    init_tracing(DEFAULT_DIRECTIVES, config.json_logs());

    info!("START consumer.");
    info!(
        kafka_brokers = %config.kafka_brokers,
        topic = %config.kafka_topic,
        group_id = %config.kafka_consumer_group_id,
        "Configuration loaded"
    );

    let code = match run(&config).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, exit_code = e.exit_code(), "Consumer failed");
            e.exit_code()
        }
    };

    info!(
        "END consumer for topic '{}' and group '{}'.",
        config.kafka_topic, config.kafka_consumer_group_id
    );
    std::process::exit(code);
}

async fn run(config: &Config) -> Result<(), StartupError> {
    let (trigger, signal) = shutdown::channel();
    let _signals = listen_for_signals(trigger);

    let subscription = KafkaSubscription::from_config(config)?;
    let consumer = BuzzConsumer::new(subscription, ConsumerSettings::from_config(config));
    let report = consumer.run(signal).await;

    info!(
        received = report.received,
        relevant = report.relevant,
        other = report.other,
        skipped = report.skipped,
        duplicates = report.duplicates,
        transport_errors = report.transport_errors,
        "Consumer summary"
    );

    Ok(())
}
