use serde::{Deserialize, Serialize};

use crate::types::{FinishReason, SessionId, Timestamp};

/// Events emitted by a dictation session to its observers.
///
/// This is the whole outbound contract of the session: a UI never reads the
/// session's state directly, it reacts to these. Every failure that disables
/// recognition is represented here with a human readable reason.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    // =========================================================================
    // Availability & authorization
    // =========================================================================
    /// No recognizer exists for the configured locale.
    UnavailableForLocale {
        locale: String,
        reason: String,
        timestamp: Timestamp,
    },

    /// A recognizer exists but cannot be used right now.
    TemporarilyUnavailable { reason: String, timestamp: Timestamp },

    /// Result of the authorization request.
    Authorized {
        authorized: bool,
        timestamp: Timestamp,
    },

    /// Whether a recognition can be started.
    Ready { ready: bool, timestamp: Timestamp },

    /// Whether the recognizer can run without a network round trip.
    OnDeviceSupport {
        available: bool,
        timestamp: Timestamp,
    },

    /// Recognition was disabled by authorization outcome.
    Disabled { reason: String, timestamp: Timestamp },

    // =========================================================================
    // Recognition sessions
    // =========================================================================
    /// Audio capture and recognition are running.
    Started {
        session_id: SessionId,
        on_device: bool,
        timestamp: Timestamp,
    },

    /// Partial or final transcript for the active session.
    TranscriptUpdate {
        session_id: SessionId,
        text: String,
        is_final: bool,
        timestamp: Timestamp,
    },

    /// The session ended and the session is back to ready.
    Finished {
        session_id: SessionId,
        reason: FinishReason,
        timestamp: Timestamp,
    },

    /// A start attempt failed before any recognition began.
    StartFailed { reason: String, timestamp: Timestamp },
}

impl SessionEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            SessionEvent::UnavailableForLocale { timestamp, .. }
            | SessionEvent::TemporarilyUnavailable { timestamp, .. }
            | SessionEvent::Authorized { timestamp, .. }
            | SessionEvent::Ready { timestamp, .. }
            | SessionEvent::OnDeviceSupport { timestamp, .. }
            | SessionEvent::Disabled { timestamp, .. }
            | SessionEvent::Started { timestamp, .. }
            | SessionEvent::TranscriptUpdate { timestamp, .. }
            | SessionEvent::Finished { timestamp, .. }
            | SessionEvent::StartFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the event name used in logs and JSON output.
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::UnavailableForLocale { .. } => "unavailable_for_locale",
            SessionEvent::TemporarilyUnavailable { .. } => "temporarily_unavailable",
            SessionEvent::Authorized { .. } => "authorized",
            SessionEvent::Ready { .. } => "ready",
            SessionEvent::OnDeviceSupport { .. } => "on_device_support",
            SessionEvent::Disabled { .. } => "disabled",
            SessionEvent::Started { .. } => "started",
            SessionEvent::TranscriptUpdate { .. } => "transcript_update",
            SessionEvent::Finished { .. } => "finished",
            SessionEvent::StartFailed { .. } => "start_failed",
        }
    }

    /// Returns the recognition session this event belongs to, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            SessionEvent::Started { session_id, .. }
            | SessionEvent::TranscriptUpdate { session_id, .. }
            | SessionEvent::Finished { session_id, .. } => Some(*session_id),
            _ => None,
        }
    }

    /// Human readable failure text, for events that disable recognition.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            SessionEvent::UnavailableForLocale { reason, .. }
            | SessionEvent::TemporarilyUnavailable { reason, .. }
            | SessionEvent::Disabled { reason, .. }
            | SessionEvent::StartFailed { reason, .. } => Some(reason),
            SessionEvent::Finished {
                reason: FinishReason::Failed { reason },
                ..
            } => Some(reason),
            _ => None,
        }
    }
}
