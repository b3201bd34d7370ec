//! External data sources

pub mod openweather;

use async_trait::async_trait;
use serde_json::Number;

pub use openweather::OpenWeatherClient;

/// One observation from the data source
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    pub description: String,
    /// Temperature in °C, kept as sent so `3` and `3.0` print differently
    pub value: Number,
}

/// Source polled once per generation cycle.
///
/// Implementations never fail: network or parse problems are logged and
/// reported as `None`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, location: &str) -> Option<WeatherReading>;
}
