//! Dictation session: the handle a UI owns and the actor that drives it.
//!
//! `DictationSession` is a cheap, cloneable handle. Every operation posts a
//! message to a single actor task that owns the recognizer, the audio input,
//! the audio session and the in-flight recognition task. Collaborator
//! callbacks go through the same inbox, so state is only ever mutated on one
//! serialized context. Effects are observed through `SessionEvent`s.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use dictate_core::config::DictateConfig;
use dictate_core::error::{DictateError, Result};
use dictate_core::events::SessionEvent;
use dictate_core::types::{
    AudioFrame, AuthorizationStatus, FinishReason, RecognitionResult, RequestOptions, SessionId,
    UnavailableReason,
};

use crate::callback::{
    post, AuthorizationReply, AvailabilitySink, FrameSink, Message, ResultSink, WeakInbox,
};
use crate::engine::{
    AudioCapture, AudioSession, RecognitionEngine, RecognitionTask, SpeechRecognizer,
};
use crate::state::{SessionState, StateMachine};

/// Point-in-time view of the session, read on the actor's context.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub supports_on_device_recognition: bool,
    /// Latest transcript of the current or most recent recognition.
    pub transcript: Option<String>,
    /// Id of the in-flight recognition, if any.
    pub active_session: Option<SessionId>,
    /// Frames forwarded to the in-flight recognition so far.
    pub frames_forwarded: u64,
}

/// Handle to a dictation session.
///
/// Operations return as soon as the request is queued. They fail only with
/// `DictateError::SessionClosed` when the actor is gone. Dropping every
/// handle tears the session down.
#[derive(Debug, Clone)]
pub struct DictationSession {
    inbox: mpsc::UnboundedSender<Message>,
    events: broadcast::Sender<SessionEvent>,
    state: StateMachine,
}

impl DictationSession {
    /// Spawn the session actor on the current tokio runtime.
    ///
    /// The session starts `Uninitialized`; call `initialize()` once the
    /// owning UI is shown. Subscribe before initializing to see every event.
    pub fn spawn<E, C, S>(engine: E, capture: C, audio_session: S, config: DictateConfig) -> Self
    where
        E: RecognitionEngine,
        C: AudioCapture,
        S: AudioSession,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.session.event_capacity.max(1));
        let state = StateMachine::new();

        let actor = SessionActor {
            engine,
            capture,
            audio_session,
            config,
            state: state.clone(),
            events: events.clone(),
            inbox: tx.downgrade(),
            recognizer: None,
            generation: 0,
            authorized: false,
            available: false,
            on_device: false,
            transcript: None,
            active: None,
            tap_installed: false,
        };
        tokio::spawn(actor.run(rx));

        Self {
            inbox: tx,
            events,
            state,
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Last state applied by the actor.
    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// Probe locale support and availability, then request authorization.
    pub fn initialize(&self) -> Result<()> {
        self.send(Message::Initialize)
    }

    /// Start recognizing when ready, stop gracefully when recognizing.
    pub fn start_stop(&self) -> Result<()> {
        self.send(Message::StartStop)
    }

    /// Start a new recognition, silently superseding an active one.
    pub fn start(&self) -> Result<()> {
        self.send(Message::Start)
    }

    /// Abort the active recognition without waiting for a final result.
    /// Does nothing when no recognition is active.
    pub fn cancel(&self) -> Result<()> {
        self.send(Message::Cancel)
    }

    /// Cancel any recognition, detach from the recognizer and return to
    /// `Uninitialized`. The session can be initialized again afterwards.
    pub fn shutdown(&self) -> Result<()> {
        self.send(Message::Shutdown)
    }

    /// Read the session after every previously queued message was applied.
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Message::Snapshot(tx))?;
        rx.await.map_err(|_| DictateError::SessionClosed)
    }

    fn send(&self, msg: Message) -> Result<()> {
        self.inbox.send(msg).map_err(|_| DictateError::SessionClosed)
    }
}

// =============================================================================
// Actor
// =============================================================================

struct ActiveRequest {
    id: SessionId,
    task: Box<dyn RecognitionTask>,
    frames: u64,
}

/// How the in-flight task is released during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Release {
    /// The task already delivered its final result.
    Completed,
    /// Abort the task.
    Cancel,
}

struct SessionActor<E, C, S> {
    engine: E,
    capture: C,
    audio_session: S,
    config: DictateConfig,
    state: StateMachine,
    events: broadcast::Sender<SessionEvent>,
    inbox: WeakInbox,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    /// Bumped by every initialize/shutdown; stale callbacks carry an older value.
    generation: u64,
    authorized: bool,
    available: bool,
    on_device: bool,
    transcript: Option<String>,
    active: Option<ActiveRequest>,
    tap_installed: bool,
}

impl<E, C, S> SessionActor<E, C, S>
where
    E: RecognitionEngine,
    C: AudioCapture,
    S: AudioSession,
{
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        tracing::debug!("Dictation session actor started");
        while let Some(msg) = rx.recv().await {
            self.handle(msg);
        }
        self.shut_down();
        tracing::debug!("Dictation session actor stopped");
    }

    fn handle(&mut self, msg: Message) {
        match msg {
            Message::Initialize => self.initialize(),
            Message::StartStop => self.start_stop(),
            Message::Start => self.start_superseding(),
            Message::Cancel => self.cancel(),
            Message::Shutdown => self.shut_down(),
            Message::Snapshot(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    tracing::trace!("Snapshot requester went away");
                }
            }
            Message::AuthorizationResolved { generation, status } => {
                self.on_authorization(generation, status)
            }
            Message::AvailabilityChanged {
                generation,
                available,
            } => self.on_availability(generation, available),
            Message::Frame { request, frame } => self.on_frame(request, frame),
            Message::Recognition { request, outcome } => self.on_recognition(request, outcome),
            Message::StopDeadline { request } => self.on_stop_deadline(request),
        }
    }

    // -------------------------------------------------------------------------
    // Availability & authorization
    // -------------------------------------------------------------------------

    fn initialize(&mut self) {
        if self.active.is_some() {
            self.end_session(Release::Cancel, FinishReason::Cancelled);
        }
        self.detach_recognizer();
        self.generation += 1;
        self.authorized = false;
        self.available = false;
        self.on_device = false;
        self.transcript = None;

        if !self.set_state(SessionState::CheckingAvailability) {
            return;
        }

        let locale = self.config.recognition.locale.clone();
        let Some(recognizer) = self.engine.recognizer(&locale) else {
            tracing::warn!(locale = %locale, "No speech recognizer for locale");
            self.set_state(SessionState::Unavailable(UnavailableReason::LocaleUnsupported));
            self.emit(SessionEvent::UnavailableForLocale {
                locale,
                reason: UnavailableReason::LocaleUnsupported.message().to_string(),
                timestamp: Utc::now(),
            });
            return;
        };

        recognizer.set_availability_observer(Some(AvailabilitySink::new(
            self.inbox.clone(),
            self.generation,
        )));
        self.available = recognizer.is_available();
        self.on_device = recognizer.supports_on_device_recognition();
        self.recognizer = Some(recognizer);

        if !self.available {
            tracing::info!(locale = %locale, "Speech recognizer temporarily unavailable");
            self.set_state(SessionState::TEMPORARILY_UNAVAILABLE);
            self.emit(SessionEvent::TemporarilyUnavailable {
                reason: UnavailableReason::TemporarilyUnavailable
                    .message()
                    .to_string(),
                timestamp: Utc::now(),
            });
            return;
        }

        self.request_authorization();
    }

    fn request_authorization(&mut self) {
        if !self.set_state(SessionState::AwaitingAuthorization) {
            return;
        }
        tracing::debug!(generation = self.generation, "Requesting speech authorization");
        self.engine
            .request_authorization(AuthorizationReply::new(self.inbox.clone(), self.generation));
    }

    fn on_authorization(&mut self, generation: u64, status: AuthorizationStatus) {
        let current = self.state.current();
        if generation != self.generation || current != SessionState::AwaitingAuthorization {
            tracing::debug!(
                generation,
                current_generation = self.generation,
                state = %current,
                "Ignoring stale authorization reply"
            );
            return;
        }

        tracing::info!(status = %status, "Speech authorization resolved");
        match status {
            AuthorizationStatus::Authorized => {
                self.authorized = true;
                self.refresh_on_device();
                self.emit(SessionEvent::Authorized {
                    authorized: true,
                    timestamp: Utc::now(),
                });
                if !self.available {
                    self.set_state(SessionState::TEMPORARILY_UNAVAILABLE);
                    self.emit(SessionEvent::TemporarilyUnavailable {
                        reason: UnavailableReason::TemporarilyUnavailable
                            .message()
                            .to_string(),
                        timestamp: Utc::now(),
                    });
                    return;
                }
                self.set_state(SessionState::Ready);
                self.emit_readiness(true);
            }
            AuthorizationStatus::Denied => {
                self.set_state(SessionState::AuthorizationDenied);
                self.emit(SessionEvent::Authorized {
                    authorized: false,
                    timestamp: Utc::now(),
                });
                self.emit_disabled(status);
            }
            AuthorizationStatus::Restricted => {
                self.set_state(SessionState::AuthorizationRestricted);
                self.emit_disabled(status);
            }
            AuthorizationStatus::NotDetermined => {
                self.set_state(SessionState::NotReady);
                self.emit_disabled(status);
            }
        }
    }

    fn on_availability(&mut self, generation: u64, available: bool) {
        let current = self.state.current();
        if generation != self.generation
            || current.is_terminal()
            || matches!(
                current,
                SessionState::Uninitialized | SessionState::CheckingAvailability
            )
        {
            tracing::debug!(available, state = %current, "Ignoring availability change");
            return;
        }

        tracing::info!(available, "Speech recognizer availability changed");
        self.available = available;
        self.refresh_on_device();

        match current {
            // Settled once authorization resolves.
            SessionState::AwaitingAuthorization => return,
            SessionState::Ready if !available => {
                self.set_state(SessionState::TEMPORARILY_UNAVAILABLE);
            }
            SessionState::TEMPORARILY_UNAVAILABLE if available => {
                if !self.authorized {
                    self.request_authorization();
                    return;
                }
                self.set_state(SessionState::Ready);
            }
            // Recognizing/Stopping settle when the session ends.
            _ => {}
        }

        self.emit_readiness(self.authorized && available);
    }

    fn refresh_on_device(&mut self) {
        if let Some(recognizer) = &self.recognizer {
            self.on_device = recognizer.supports_on_device_recognition();
        }
    }

    fn detach_recognizer(&mut self) {
        if let Some(recognizer) = self.recognizer.take() {
            recognizer.set_availability_observer(None);
        }
    }

    // -------------------------------------------------------------------------
    // Recognition
    // -------------------------------------------------------------------------

    fn start_stop(&mut self) {
        match self.state.current() {
            SessionState::Recognizing => self.stop(),
            SessionState::Ready => {
                self.start(None);
            }
            other => tracing::debug!(state = %other, "start_stop ignored"),
        }
    }

    fn start_superseding(&mut self) {
        match self.state.current() {
            SessionState::Ready => {
                self.start(None);
            }
            SessionState::Recognizing | SessionState::Stopping => {
                let superseded = self.teardown(Release::Cancel);
                self.settle();
                if self.state.current() != SessionState::Ready {
                    // No replacement can start, so the old request ends visibly.
                    if let Some(id) = superseded {
                        self.emit_finished(id, FinishReason::Cancelled);
                    }
                } else if self.start(superseded) {
                    if let Some(id) = superseded {
                        tracing::info!(session_id = %id, "Recognition superseded by a new start");
                    }
                }
            }
            other => tracing::debug!(state = %other, "start ignored"),
        }
    }

    /// Start a new recognition. `superseded` is a request already torn down
    /// for this start; it is reported as cancelled if the start fails.
    fn start(&mut self, superseded: Option<SessionId>) -> bool {
        if let Some(mut stale) = self.active.take() {
            tracing::debug!(session_id = %stale.id, "Cancelling stale recognition request");
            stale.task.cancel();
        }

        let Some(recognizer) = self.recognizer.clone() else {
            tracing::warn!("start requested without a recognizer");
            if let Some(old) = superseded {
                self.emit_finished(old, FinishReason::Cancelled);
            }
            return false;
        };

        if let Err(e) = self.audio_session.configure(&self.config.audio_session) {
            tracing::warn!(error = %e, "Audio session configuration failed");
            self.fail_start(&e, superseded);
            return false;
        }

        let id = Uuid::new_v4();
        let options = RequestOptions {
            report_partial_results: self.config.recognition.report_partial_results,
            requires_on_device_recognition: self.config.recognition.prefer_on_device
                && self.on_device,
        };

        let sink = FrameSink::new(self.inbox.clone(), id);
        if let Err(e) = self
            .capture
            .install_tap(self.config.recognition.tap_buffer_size, sink)
        {
            tracing::warn!(error = %e, "Installing audio tap failed");
            self.abort_start(&e, superseded);
            return false;
        }
        self.tap_installed = true;

        let results = ResultSink::new(self.inbox.clone(), id);
        let task = match recognizer.recognition_task(&options, results) {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(error = %e, "Creating recognition task failed");
                self.abort_start(&e, superseded);
                return false;
            }
        };
        self.active = Some(ActiveRequest {
            id,
            task,
            frames: 0,
        });

        if let Err(e) = self.capture.start() {
            tracing::warn!(error = %e, "Starting audio capture failed");
            if let Some(mut active) = self.active.take() {
                active.task.cancel();
            }
            self.abort_start(&e, superseded);
            return false;
        }

        self.transcript = None;
        self.set_state(SessionState::Recognizing);
        tracing::info!(
            session_id = %id,
            on_device = options.requires_on_device_recognition,
            "Recognition started"
        );
        self.emit(SessionEvent::Started {
            session_id: id,
            on_device: options.requires_on_device_recognition,
            timestamp: Utc::now(),
        });

        if let Some(prompt) = self.config.session.prompt() {
            self.emit(SessionEvent::TranscriptUpdate {
                session_id: id,
                text: prompt.to_string(),
                is_final: false,
                timestamp: Utc::now(),
            });
        }
        true
    }

    /// Undo a partially performed start. State stays `Ready`.
    fn abort_start(&mut self, error: &DictateError, superseded: Option<SessionId>) {
        if self.capture.is_running() {
            self.capture.stop();
        }
        if self.tap_installed {
            self.capture.remove_tap();
            self.tap_installed = false;
        }
        self.audio_session
            .deactivate(self.config.audio_session.notify_others_on_deactivation);
        self.fail_start(error, superseded);
    }

    fn fail_start(&self, error: &DictateError, superseded: Option<SessionId>) {
        if let Some(old) = superseded {
            self.emit_finished(old, FinishReason::Cancelled);
        }
        self.emit_start_failed(error);
    }

    /// Graceful stop: end the audio and wait for the final result.
    fn stop(&mut self) {
        let Some(id) = self.active.as_ref().map(|a| a.id) else {
            tracing::warn!("Recognizing without an active request");
            self.settle();
            return;
        };

        self.set_state(SessionState::Stopping);
        self.stop_capture();
        if let Some(active) = self.active.as_mut() {
            active.task.end_audio();
            active.task.finish();
        }
        tracing::info!(session_id = %id, "Recognition stopping, awaiting final result");
        self.schedule_stop_deadline(id);
    }

    fn schedule_stop_deadline(&self, request: SessionId) {
        let inbox = self.inbox.clone();
        let timeout = Duration::from_millis(self.config.session.stop_timeout_ms);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            post(&inbox, Message::StopDeadline { request });
        });
    }

    fn cancel(&mut self) {
        if self.active.is_none() {
            tracing::debug!("cancel ignored, no active recognition");
            return;
        }
        self.end_session(Release::Cancel, FinishReason::Cancelled);
    }

    fn on_frame(&mut self, request: SessionId, frame: AudioFrame) {
        let recognizing = self.state.current() == SessionState::Recognizing;
        match self.active.as_mut() {
            Some(active) if active.id == request && recognizing => {
                active.task.append(&frame);
                active.frames += 1;
                tracing::trace!(
                    session_id = %request,
                    samples = frame.samples.len(),
                    "Frame forwarded"
                );
            }
            _ => tracing::trace!(session_id = %request, "Dropping frame for inactive request"),
        }
    }

    fn on_recognition(
        &mut self,
        request: SessionId,
        outcome: std::result::Result<RecognitionResult, DictateError>,
    ) {
        if self.active.as_ref().map(|a| a.id) != Some(request) {
            tracing::debug!(session_id = %request, "Ignoring result for stale request");
            return;
        }

        match outcome {
            Ok(result) => {
                tracing::debug!(
                    session_id = %request,
                    text_len = result.text.len(),
                    is_final = result.is_final,
                    "Transcript update"
                );
                self.transcript = Some(result.text.clone());
                self.emit(SessionEvent::TranscriptUpdate {
                    session_id: request,
                    text: result.text,
                    is_final: result.is_final,
                    timestamp: Utc::now(),
                });
                if result.is_final {
                    self.end_session(Release::Completed, FinishReason::Completed);
                }
            }
            Err(e) => {
                tracing::warn!(session_id = %request, error = %e, "Recognition ended with error");
                self.end_session(
                    Release::Cancel,
                    FinishReason::Failed {
                        reason: e.to_string(),
                    },
                );
            }
        }
    }

    fn on_stop_deadline(&mut self, request: SessionId) {
        let stopping = self.state.current() == SessionState::Stopping;
        if stopping && self.active.as_ref().map(|a| a.id) == Some(request) {
            tracing::warn!(session_id = %request, "No final result before stop deadline");
            self.end_session(Release::Cancel, FinishReason::TimedOut);
        }
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    fn stop_capture(&mut self) {
        if self.capture.is_running() {
            self.capture.stop();
        }
        if self.tap_installed {
            self.capture.remove_tap();
            self.tap_installed = false;
        }
    }

    /// Stop capture, remove the tap, release the task and clear handles.
    /// Returns the id of the released request.
    fn teardown(&mut self, release: Release) -> Option<SessionId> {
        self.stop_capture();
        let mut active = self.active.take()?;
        if release == Release::Cancel {
            active.task.end_audio();
            active.task.cancel();
        }
        let id = active.id;
        tracing::debug!(
            session_id = %id,
            frames = active.frames,
            ?release,
            "Recognition torn down"
        );
        drop(active);
        self.audio_session
            .deactivate(self.config.audio_session.notify_others_on_deactivation);
        Some(id)
    }

    fn end_session(&mut self, release: Release, reason: FinishReason) {
        let Some(id) = self.teardown(release) else {
            return;
        };
        self.settle();
        self.emit_finished(id, reason);
    }

    /// Return to `Ready`, or to temporarily unavailable if availability was
    /// lost while recognizing.
    fn settle(&mut self) {
        let target = if self.available {
            SessionState::Ready
        } else {
            SessionState::TEMPORARILY_UNAVAILABLE
        };
        if self.state.current() != target {
            self.set_state(target);
        }
    }

    fn shut_down(&mut self) {
        if self.active.is_some() {
            self.end_session(Release::Cancel, FinishReason::Cancelled);
        }
        self.detach_recognizer();
        self.generation += 1;
        self.authorized = false;
        self.state.reset();
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.current(),
            supports_on_device_recognition: self.on_device,
            transcript: self.transcript.clone(),
            active_session: self.active.as_ref().map(|a| a.id),
            frames_forwarded: self.active.as_ref().map(|a| a.frames).unwrap_or(0),
        }
    }

    fn set_state(&self, target: SessionState) -> bool {
        match self.state.transition(target) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected session state transition");
                false
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        tracing::debug!(event = event.event_name(), "Session event");
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn emit_readiness(&self, ready: bool) {
        self.emit(SessionEvent::Ready {
            ready,
            timestamp: Utc::now(),
        });
        self.emit(SessionEvent::OnDeviceSupport {
            available: self.on_device,
            timestamp: Utc::now(),
        });
    }

    fn emit_disabled(&self, status: AuthorizationStatus) {
        let reason = status
            .disabled_reason()
            .unwrap_or(dictate_core::types::MSG_NOT_AUTHORIZED);
        self.emit(SessionEvent::Disabled {
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn emit_finished(&self, session_id: SessionId, reason: FinishReason) {
        tracing::info!(session_id = %session_id, reason = %reason, "Recognition finished");
        self.emit(SessionEvent::Finished {
            session_id,
            reason,
            timestamp: Utc::now(),
        });
    }

    fn emit_start_failed(&self, error: &DictateError) {
        self.emit(SessionEvent::StartFailed {
            reason: error.to_string(),
            timestamp: Utc::now(),
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
