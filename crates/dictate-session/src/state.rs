//! Session state machine with thread-safe transitions.
//!
//! Valid transitions for the dictation lifecycle:
//! - Uninitialized -> CheckingAvailability (initialize)
//! - CheckingAvailability -> Unavailable | AwaitingAuthorization
//! - AwaitingAuthorization -> Ready | AuthorizationDenied | AuthorizationRestricted | NotReady
//! - Ready <-> Recognizing
//! - Recognizing -> Stopping -> Ready (graceful stop)
//! - Ready <-> Unavailable(TemporarilyUnavailable) (availability changes)
//! - any state -> Uninitialized (shutdown)

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use dictate_core::error::DictateError;
use dictate_core::types::UnavailableReason;

/// Operational state of a dictation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Constructed, `initialize()` not called yet (or shut down).
    Uninitialized,
    /// Looking up a recognizer for the locale.
    CheckingAvailability,
    /// No usable recognizer.
    Unavailable(UnavailableReason),
    /// Waiting for the user to answer the authorization prompt.
    AwaitingAuthorization,
    /// The user refused speech recognition.
    AuthorizationDenied,
    /// Device policy forbids speech recognition.
    AuthorizationRestricted,
    /// Authorization is undetermined; re-initialize to ask again.
    NotReady,
    /// Idle and able to start recognizing.
    Ready,
    /// Capturing audio and streaming it into a recognition task.
    Recognizing,
    /// Capture stopped, waiting for the final result.
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "Uninitialized"),
            SessionState::CheckingAvailability => write!(f, "CheckingAvailability"),
            SessionState::Unavailable(UnavailableReason::LocaleUnsupported) => {
                write!(f, "Unavailable(LocaleUnsupported)")
            }
            SessionState::Unavailable(UnavailableReason::TemporarilyUnavailable) => {
                write!(f, "Unavailable(TemporarilyUnavailable)")
            }
            SessionState::AwaitingAuthorization => write!(f, "AwaitingAuthorization"),
            SessionState::AuthorizationDenied => write!(f, "AuthorizationDenied"),
            SessionState::AuthorizationRestricted => write!(f, "AuthorizationRestricted"),
            SessionState::NotReady => write!(f, "NotReady"),
            SessionState::Ready => write!(f, "Ready"),
            SessionState::Recognizing => write!(f, "Recognizing"),
            SessionState::Stopping => write!(f, "Stopping"),
        }
    }
}

impl SessionState {
    /// Recognizer exists but the engine reports it unusable for now.
    pub const TEMPORARILY_UNAVAILABLE: SessionState =
        SessionState::Unavailable(UnavailableReason::TemporarilyUnavailable);

    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use SessionState::*;

        if *target == Uninitialized {
            return *self != Uninitialized;
        }

        matches!(
            (self, target),
            // (Re-)initialization
            (Uninitialized | Unavailable(_) | AwaitingAuthorization | AuthorizationDenied
                | AuthorizationRestricted | NotReady | Ready, CheckingAvailability)
                | (CheckingAvailability, Unavailable(_) | AwaitingAuthorization)
                // Authorization outcome
                | (AwaitingAuthorization, Ready | AuthorizationDenied | AuthorizationRestricted
                    | NotReady)
                // Recognition
                | (Ready, Recognizing)
                | (Recognizing, Stopping)
                | (Recognizing | Stopping, Ready)
        ) || self.is_availability_change(target)
    }

    fn is_availability_change(&self, target: &SessionState) -> bool {
        use SessionState::*;

        if *target == Self::TEMPORARILY_UNAVAILABLE {
            return matches!(
                self,
                AwaitingAuthorization | Ready | Recognizing | Stopping
            );
        }
        *self == Self::TEMPORARILY_UNAVAILABLE && matches!(target, Ready | AwaitingAuthorization)
    }

    /// States that only `initialize()` can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Unavailable(UnavailableReason::LocaleUnsupported)
                | SessionState::AuthorizationDenied
                | SessionState::AuthorizationRestricted
                | SessionState::NotReady
        )
    }

    /// States in which a recognition task may exist.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Recognizing | SessionState::Stopping)
    }
}

/// Thread-safe holder of the current `SessionState`.
///
/// Only the session actor mutates it; handles read it. Every transition is
/// validated before being applied.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<SessionState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Uninitialized`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Uninitialized)),
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attempt to transition to the target state.
    ///
    /// Returns a `DictateError::Session` if the transition is not allowed
    /// from the current state; the state is left unchanged in that case.
    pub fn transition(&self, target: SessionState) -> Result<(), DictateError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_transition_to(&target) {
            tracing::debug!("Session state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(DictateError::Session(format!(
                "Invalid state transition: {} -> {}",
                *state, target
            )))
        }
    }

    /// Force the state machine back to `Uninitialized`.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != SessionState::Uninitialized {
            tracing::debug!("Session state machine reset to Uninitialized from {}", *state);
        }
        *state = SessionState::Uninitialized;
    }
}

// =============================================================================
// Tests
// =============================================================================
