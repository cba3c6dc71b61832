//! Detection service response.

use serde::{Deserialize, Deserializer};

/// Status text shown when the service reports nothing.
pub const NO_OBJECTS_MESSAGE: &str = "No objects detected.";

/// Parsed response of one detection exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DetectionResult {
    /// Free-text description of the scene. `null` reads as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub guidance: String,
    /// More specific instruction, preferred for speech when present.
    #[serde(default)]
    pub actionable_guidance: Option<String>,
    /// Application-level failure reported by the service.
    #[serde(default)]
    pub error: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl DetectionResult {
    /// Text to speak: the actionable instruction if non-empty, else the
    /// guidance. May be empty.
    pub fn spoken_text(&self) -> &str {
        self.actionable_guidance
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.guidance)
    }

    /// Text for the status line.
    pub fn display_text(&self) -> &str {
        if self.guidance.is_empty() {
            NO_OBJECTS_MESSAGE
        } else {
            &self.guidance
        }
    }

    /// Error message carried by the body, ignoring empty strings.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|s| !s.is_empty())
    }
}
