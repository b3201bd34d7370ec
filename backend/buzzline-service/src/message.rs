//! Message framing shared by both ends of the pipeline
use crate::error::DecodeError;
use crate::providers::WeatherReading;
use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// Payload as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

/// A consumed message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: String,
    pub partition: i32,
    /// Broker-assigned, monotonic per partition
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Payload>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Payload normalized to text, whether it arrived as bytes or as a string
    pub fn text(&self) -> Result<Cow<'_, str>, DecodeError> {
        match &self.payload {
            Some(Payload::Text(text)) => Ok(Cow::Borrowed(text.as_str())),
            Some(Payload::Bytes(bytes)) => std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|source| DecodeError::InvalidUtf8 {
                    topic: self.topic.clone(),
                    partition: self.partition,
                    offset: self.offset,
                    source,
                }),
            None => Err(DecodeError::EmptyPayload {
                topic: self.topic.clone(),
                partition: self.partition,
                offset: self.offset,
            }),
        }
    }
}

/// Text published for one generation cycle
pub fn weather_message(location: &str, reading: Option<&WeatherReading>) -> String {
    match reading {
        Some(reading) => format!(
            "Weather in {}: {}, Temp: {}°C",
            location, reading.description, reading.value
        ),
        None => format!("Could not retrieve weather data for {}.", location),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Number;

    fn message(payload: Option<Payload>) -> Message {
        Message {
            topic: "buzzline".to_string(),
            partition: 0,
            offset: 7,
            key: None,
            payload,
            timestamp: None,
        }
    }

    fn reading(value: Number) -> WeatherReading {
        WeatherReading {
            description: "clear sky".to_string(),
            value,
        }
    }

    #[test]
    fn test_weather_message_with_reading() {
        let reading = reading(Number::from_f64(5.2).unwrap());

        assert_eq!(
            weather_message("Oslo", Some(&reading)),
            "Weather in Oslo: clear sky, Temp: 5.2°C"
        );
    }

    #[test]
    fn test_weather_message_fallback() {
        assert_eq!(
            weather_message("Oslo", None),
            "Could not retrieve weather data for Oslo."
        );
    }

    #[test]
    fn test_value_prints_as_received() {
        let cases = [
            (Number::from(3), "3"),
            (Number::from(-4), "-4"),
            (Number::from_f64(20.0).unwrap(), "20.0"),
            (Number::from_f64(-3.75).unwrap(), "-3.75"),
        ];

        for (value, expected) in cases {
            assert_eq!(
                weather_message("Oslo", Some(&reading(value))),
                format!("Weather in Oslo: clear sky, Temp: {expected}°C")
            );
        }
    }

    #[test]
    fn test_bytes_and_text_normalize_to_same_text() {
        let text = message(Some(Payload::Text("Weather in Oslo".to_string())));
        let bytes = message(Some(Payload::Bytes(b"Weather in Oslo".to_vec())));

        assert_eq!(text.text().unwrap(), bytes.text().unwrap());
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let msg = message(Some(Payload::Bytes(vec![0xff, 0xfe, 0x00])));

        match msg.text() {
            Err(DecodeError::InvalidUtf8 { offset, .. }) => assert_eq!(offset, 7),
            other => panic!("expected InvalidUtf8, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_payload_is_decode_error() {
        assert!(matches!(
            message(None).text(),
            Err(DecodeError::EmptyPayload { .. })
        ));
    }
}
