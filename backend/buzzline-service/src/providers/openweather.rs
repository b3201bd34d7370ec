//! OpenWeather current-weather API client
use super::{WeatherReading, WeatherSource};
use crate::config::Config;
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Number;
use std::time::Duration;
use tracing::{debug, error};

// ============================================
// Response types
// ============================================

#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    #[serde(default)]
    weather: Vec<WeatherCondition>,
    main: Option<MainReadings>,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: Number,
}

impl CurrentWeatherResponse {
    fn into_reading(self) -> Result<WeatherReading, FetchError> {
        let description = self
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or(FetchError::MissingField("weather"))?;
        let main = self.main.ok_or(FetchError::MissingField("main"))?;

        Ok(WeatherReading {
            description,
            value: main.temp,
        })
    }
}

/// OpenWeather API client (metric units)
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(
            config.openweather_base_url.clone(),
            config.openweather_api_key.clone(),
            config.openweather_timeout(),
        )
    }

    /// Current conditions for `city`
    pub async fn current_weather(&self, city: &str) -> Result<WeatherReading, FetchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: CurrentWeatherResponse = response.json().await?;
        let reading = body.into_reading()?;

        debug!(
            city = %city,
            description = %reading.description,
            temp = %reading.value,
            "Weather data received"
        );

        Ok(reading)
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch(&self, location: &str) -> Option<WeatherReading> {
        match self.current_weather(location).await {
            Ok(reading) => Some(reading),
            Err(e) => {
                error!(city = %location, error = %e, "Error fetching weather data");
                None
            }
        }
    }
}
