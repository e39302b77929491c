//! Typed callback handles handed to external collaborators.
//!
//! The recognition engine and the audio input call back from their own
//! threads. Every handle here only posts a message into the session's inbox;
//! the session actor applies it later on its single serialized context, in
//! the order the callbacks resolved. Handles hold a weak sender, so a
//! collaborator keeping one alive never keeps a dropped session running.

use std::fmt;

use tokio::sync::{mpsc, oneshot};

use dictate_core::error::DictateError;
use dictate_core::types::{AudioFrame, AuthorizationStatus, RecognitionResult, SessionId};

use crate::session::SessionSnapshot;

/// Everything the session actor reacts to.
pub(crate) enum Message {
    // Commands from the owning UI.
    Initialize,
    StartStop,
    Start,
    Cancel,
    Shutdown,
    Snapshot(oneshot::Sender<SessionSnapshot>),

    // Callbacks from collaborators.
    AuthorizationResolved {
        generation: u64,
        status: AuthorizationStatus,
    },
    AvailabilityChanged {
        generation: u64,
        available: bool,
    },
    Frame {
        request: SessionId,
        frame: AudioFrame,
    },
    Recognition {
        request: SessionId,
        outcome: Result<RecognitionResult, DictateError>,
    },
    StopDeadline {
        request: SessionId,
    },
}

pub(crate) type WeakInbox = mpsc::WeakUnboundedSender<Message>;

/// Post a message if the session is still alive.
pub(crate) fn post(inbox: &WeakInbox, msg: Message) -> bool {
    match inbox.upgrade() {
        Some(tx) => tx.send(msg).is_ok(),
        None => false,
    }
}

/// One-shot reply to an authorization request.
pub struct AuthorizationReply {
    inbox: WeakInbox,
    generation: u64,
}

impl AuthorizationReply {
    pub(crate) fn new(inbox: WeakInbox, generation: u64) -> Self {
        Self { inbox, generation }
    }

    /// Deliver the user's answer. Callable from any thread.
    ///
    /// Returns `false` if the session no longer exists.
    pub fn resolve(self, status: AuthorizationStatus) -> bool {
        post(
            &self.inbox,
            Message::AuthorizationResolved {
                generation: self.generation,
                status,
            },
        )
    }
}

impl fmt::Debug for AuthorizationReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationReply")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Receiver of recognizer availability changes.
#[derive(Clone)]
pub struct AvailabilitySink {
    inbox: WeakInbox,
    generation: u64,
}

impl AvailabilitySink {
    pub(crate) fn new(inbox: WeakInbox, generation: u64) -> Self {
        Self { inbox, generation }
    }

    /// Report that the recognizer became available or unavailable.
    pub fn availability_changed(&self, available: bool) -> bool {
        post(
            &self.inbox,
            Message::AvailabilityChanged {
                generation: self.generation,
                available,
            },
        )
    }
}

impl fmt::Debug for AvailabilitySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvailabilitySink")
            .field("generation", &self.generation)
            .finish()
    }
}

/// The frame-forwarding tap installed on the audio input.
///
/// Bound to one recognition request: frames pushed after that request was
/// torn down are dropped by the session.
#[derive(Clone)]
pub struct FrameSink {
    inbox: WeakInbox,
    request: SessionId,
}

impl FrameSink {
    pub(crate) fn new(inbox: WeakInbox, request: SessionId) -> Self {
        Self { inbox, request }
    }

    /// The request this tap feeds.
    pub fn request(&self) -> SessionId {
        self.request
    }

    /// Forward one captured buffer.
    pub fn push(&self, frame: AudioFrame) -> bool {
        post(
            &self.inbox,
            Message::Frame {
                request: self.request,
                frame,
            },
        )
    }
}

impl fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSink")
            .field("request", &self.request)
            .finish()
    }
}

/// Result handler of one recognition task.
#[derive(Clone)]
pub struct ResultSink {
    inbox: WeakInbox,
    request: SessionId,
}

impl ResultSink {
    pub(crate) fn new(inbox: WeakInbox, request: SessionId) -> Self {
        Self { inbox, request }
    }

    pub fn request(&self) -> SessionId {
        self.request
    }

    /// Deliver a partial/final transcript or a task failure.
    pub fn deliver(&self, outcome: Result<RecognitionResult, DictateError>) -> bool {
        post(
            &self.inbox,
            Message::Recognition {
                request: self.request,
                outcome,
            },
        )
    }
}

impl fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSink")
            .field("request", &self.request)
            .finish()
    }
}
