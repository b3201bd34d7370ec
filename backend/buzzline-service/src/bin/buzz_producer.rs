//! Buzz producer - Main entry point
//!
//! Publishes one weather message per interval to the configured topic,
//! creating the topic first when it does not exist.

use buzzline_service::kafka::{KafkaMessagePublisher, KafkaTopicAdmin};
use buzzline_service::services::ProducerSettings;
use buzzline_service::shutdown::{self, listen_for_signals};
use buzzline_service::telemetry::{init_tracing, DEFAULT_DIRECTIVES};
use buzzline_service::{
    Config, MessagePublisher, OpenWeatherClient, StartupError, TopicProvisioner, WeatherProducer,
};
use tracing::{error, info, warn};

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

    info!("START producer.");
    info!(
        kafka_brokers = %config.kafka_brokers,
        topic = %config.kafka_topic,
        city = %config.city,
        interval_secs = config.message_interval_seconds,
        "Configuration loaded"
    );

    let code = match run(config).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, exit_code = e.exit_code(), "Producer failed");
            e.exit_code()
        }
    };

    info!("END producer.");
    std::process::exit(code);
}

async fn run(config: Config) -> Result<(), StartupError> {
    let (trigger, signal) = shutdown::channel();
    let _signals = listen_for_signals(trigger);

    let publisher = KafkaMessagePublisher::from_config(&config)?;

    let provisioned = async {
        let admin = KafkaTopicAdmin::from_config(&config)?;
        TopicProvisioner::new(admin)
            .ensure(&config.topic_spec())
            .await?;
        Ok::<_, StartupError>(())
    }
    .await;

    if let Err(e) = provisioned {
        if let Err(close_err) = publisher.close().await {
            warn!(error = %close_err, "Error while closing Kafka producer");
        }
        return Err(e);
    }

    let source = match OpenWeatherClient::from_config(&config) {
        Ok(source) => source,
        Err(e) => {
            if let Err(close_err) = publisher.close().await {
                warn!(error = %close_err, "Error while closing Kafka producer");
            }
            return Err(e.into());
        }
    };

    let producer = WeatherProducer::new(publisher, source, ProducerSettings::from_config(&config));
    let report = producer.run(signal).await?;

    info!(
        cycles = report.cycles,
        published = report.published,
        fallbacks = report.fallbacks,
        failed_publishes = report.failed_publishes,
        "Producer summary"
    );

    Ok(())
}
