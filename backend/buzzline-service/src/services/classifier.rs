//! Message classification for observability
use std::fmt;

/// Marker that makes a message relevant by default
pub const WEATHER_MARKER: &str = "Weather";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Relevant,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Relevant => "relevant",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-sensitive substring classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    marker: String,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(WEATHER_MARKER)
    }
}

impl Classifier {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn classify(&self, text: &str) -> Category {
        if text.contains(self.marker.as_str()) {
            Category::Relevant
        } else {
            Category::Other
        }
    }
}

/// Classify with the default weather marker
pub fn classify(text: &str) -> Category {
    Classifier::default().classify(text)
}
