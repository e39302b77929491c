use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DictateError, Result};
use crate::types::{AudioCategory, AudioMode};

/// Top-level configuration for dictation.
///
/// Loaded from `~/.dictate/config.toml` by the binary. Every section falls
/// back to its defaults when missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictateConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub audio_session: AudioSessionConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl DictateConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DictateConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DictateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Recognizer and request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// BCP-47 locale used to look up a recognizer (e.g. "en-US").
    pub locale: String,
    /// Deliver partial results while audio is still being captured.
    pub report_partial_results: bool,
    /// Require on-device processing whenever the recognizer supports it.
    pub prefer_on_device: bool,
    /// Frames per tap callback requested from the audio input.
    pub tap_buffer_size: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            report_partial_results: true,
            prefer_on_device: true,
            tap_buffer_size: 1024,
        }
    }
}

/// Audio session setup applied before each capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSessionConfig {
    pub category: AudioCategory,
    pub mode: AudioMode,
    /// Lower the volume of other audio while dictating.
    pub duck_others: bool,
    /// Let interrupted apps resume when the session deactivates.
    pub notify_others_on_deactivation: bool,
}

impl Default for AudioSessionConfig {
    fn default() -> Self {
        Self {
            category: AudioCategory::Record,
            mode: AudioMode::Measurement,
            duck_others: true,
            notify_others_on_deactivation: true,
        }
    }
}

/// Session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
    /// How long a graceful stop waits for the final result.
    pub stop_timeout_ms: u64,
    /// Text shown as a partial transcript as soon as listening starts.
    /// Empty disables the prompt.
    pub listening_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            stop_timeout_ms: 2000,
            listening_prompt: String::new(),
        }
    }
}

impl SessionConfig {
    /// The listening prompt, if one is configured.
    pub fn prompt(&self) -> Option<&str> {
        let prompt = self.listening_prompt.trim();
        (!prompt.is_empty()).then_some(prompt)
    }
}
