//! Tracing subscriber setup shared by both binaries
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when `RUST_LOG` is not set
pub const DEFAULT_DIRECTIVES: &str = "buzzline_service=info,rdkafka=warn,info";

/// Install the global subscriber. `RUST_LOG` wins over `default_directives`.
pub fn init_tracing(default_directives: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}
