/// Configuration for the coordinator and the offscreen media context
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Document loaded into the offscreen context
pub const DEFAULT_OFFSCREEN_URL: &str = "offscreen.html";

/// Justification shown by the browser for the offscreen document
pub const DEFAULT_JUSTIFICATION: &str = "Recording from chrome.tabCapture API";

/// Default deadline for creating the offscreen document
pub const DEFAULT_CONTEXT_CREATION_TIMEOUT_MS: u64 = 5_000;

/// Default deadline for acquiring the tab's audio stream
pub const DEFAULT_STREAM_ACQUISITION_TIMEOUT_MS: u64 = 5_000;

/// Default deadline for one request/reply exchange on the message bus
pub const DEFAULT_MESSAGE_TIMEOUT_MS: u64 = 5_000;

/// Latency hint passed to the audio context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LatencyHint {
    Balanced,
    #[default]
    Interactive,
    Playback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub offscreen_url: String,
    pub offscreen_justification: String,
    pub latency_hint: LatencyHint,
    pub context_creation_timeout_ms: u64,
    pub stream_acquisition_timeout_ms: u64,
    pub message_timeout_ms: u64,
    pub log_level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            offscreen_url: DEFAULT_OFFSCREEN_URL.to_string(),
            offscreen_justification: DEFAULT_JUSTIFICATION.to_string(),
            latency_hint: LatencyHint::default(),
            context_creation_timeout_ms: DEFAULT_CONTEXT_CREATION_TIMEOUT_MS,
            stream_acquisition_timeout_ms: DEFAULT_STREAM_ACQUISITION_TIMEOUT_MS,
            message_timeout_ms: DEFAULT_MESSAGE_TIMEOUT_MS,
            log_level: "info".to_string(),
        }
    }
}

impl CaptureConfig {
    /// Parse a JSON settings object. Missing keys keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, CaptureError> {
        let config: CaptureConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.offscreen_url.trim().is_empty() {
            return Err(CaptureError::Config(
                "offscreen_url cannot be empty".to_string(),
            ));
        }

        let timeouts = [
            ("context_creation_timeout_ms", self.context_creation_timeout_ms),
            ("stream_acquisition_timeout_ms", self.stream_acquisition_timeout_ms),
            ("message_timeout_ms", self.message_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(CaptureError::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(CaptureError::Config(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }

        Ok(())
    }

    pub fn context_creation_timeout(&self) -> Duration {
        Duration::from_millis(self.context_creation_timeout_ms)
    }

    pub fn stream_acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_acquisition_timeout_ms)
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }
}
