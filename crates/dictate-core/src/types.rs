use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// UTC timestamp attached to every emitted event.
pub type Timestamp = DateTime<Utc>;

/// Identifier of one recognition session (one start -> finish cycle).
pub type SessionId = Uuid;

// =============================================================================
// Legacy status strings
// =============================================================================

pub const MSG_LOCALE_UNSUPPORTED: &str = "Speech recognition not available in your location.";
pub const MSG_TEMPORARILY_UNAVAILABLE: &str =
    "Speech recognition temporarily unavailable. Try again later.";
pub const MSG_ACCESS_DENIED: &str = "Speech recognition access denied";
pub const MSG_RESTRICTED: &str = "Speech recognition restricted";
pub const MSG_NOT_AUTHORIZED: &str = "Speech recognition not authorized";

// =============================================================================
// Enums
// =============================================================================

/// Answer to a speech recognition authorization request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user granted access.
    Authorized,
    /// The user refused access.
    Denied,
    /// Device policy forbids speech recognition.
    Restricted,
    /// The user has not answered yet.
    NotDetermined,
}

impl AuthorizationStatus {
    /// Human readable reason shown when this status disables recognition.
    pub fn disabled_reason(&self) -> Option<&'static str> {
        match self {
            AuthorizationStatus::Authorized => None,
            AuthorizationStatus::Denied => Some(MSG_ACCESS_DENIED),
            AuthorizationStatus::Restricted => Some(MSG_RESTRICTED),
            AuthorizationStatus::NotDetermined => Some(MSG_NOT_AUTHORIZED),
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationStatus::Authorized => write!(f, "authorized"),
            AuthorizationStatus::Denied => write!(f, "denied"),
            AuthorizationStatus::Restricted => write!(f, "restricted"),
            AuthorizationStatus::NotDetermined => write!(f, "not_determined"),
        }
    }
}

/// Why recognition cannot be used right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// No recognizer exists for the configured locale. Terminal.
    LocaleUnsupported,
    /// A recognizer exists but the engine reports it is not usable now
    /// (for example a network-backed locale while offline).
    TemporarilyUnavailable,
}

impl UnavailableReason {
    pub fn message(&self) -> &'static str {
        match self {
            UnavailableReason::LocaleUnsupported => MSG_LOCALE_UNSUPPORTED,
            UnavailableReason::TemporarilyUnavailable => MSG_TEMPORARILY_UNAVAILABLE,
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// How a recognition session ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FinishReason {
    /// The engine delivered a final result.
    Completed,
    /// The consumer cancelled; no final transcript is guaranteed.
    Cancelled,
    /// The engine reported an error mid-session.
    Failed { reason: String },
    /// A graceful stop did not yield a final result in time.
    TimedOut,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Completed => write!(f, "completed"),
            FinishReason::Cancelled => write!(f, "cancelled"),
            FinishReason::Failed { reason } => write!(f, "failed: {}", reason),
            FinishReason::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Audio session category requested before capture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCategory {
    #[default]
    Record,
    PlayAndRecord,
}

/// Audio session mode requested before capture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// Minimal system-supplied signal processing.
    #[default]
    Measurement,
    Default,
}

// =============================================================================
// Data carried across the engine boundary
// =============================================================================

/// One buffer of captured microphone audio.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    /// PCM samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Frame duration in seconds. Zero when the sample rate is unknown.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// A transcript delivered by the engine for the active task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Best transcription so far, formatted for display.
    pub text: String,
    /// `true` for the last result of a task.
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Options for a new recognition task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOptions {
    /// Deliver interim results before audio ends.
    pub report_partial_results: bool,
    /// Keep audio on the device; only set when the recognizer supports it.
    pub requires_on_device_recognition: bool,
}
