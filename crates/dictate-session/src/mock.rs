//! Scriptable collaborators for tests and the demo binary.
//!
//! Each mock is a cheap clone around shared state, so a test keeps one clone
//! to script the engine while the session owns the other.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dictate_core::config::AudioSessionConfig;
use dictate_core::error::DictateError;
use dictate_core::types::{AudioFrame, AuthorizationStatus, RecognitionResult, RequestOptions};

use crate::callback::{AuthorizationReply, AvailabilitySink, FrameSink, ResultSink};
use crate::engine::{
    AudioCapture, AudioSession, RecognitionEngine, RecognitionTask, SpeechRecognizer,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Recognition engine
// =============================================================================

/// What the mock knows about one recognition task it created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockTaskRecord {
    pub report_partial_results: bool,
    pub requires_on_device_recognition: bool,
    pub frames: usize,
    pub samples: usize,
    pub last_text: Option<String>,
    pub audio_ended: bool,
    pub finish_requested: bool,
    pub cancelled: bool,
    pub completed: bool,
}

impl MockTaskRecord {
    /// Neither cancelled nor completed.
    pub fn is_open(&self) -> bool {
        !self.cancelled && !self.completed
    }
}

#[derive(Debug)]
struct EngineState {
    /// `None` supports every locale.
    supported_locales: Option<Vec<String>>,
    available: bool,
    on_device: bool,
    authorization: AuthorizationStatus,
    auto_authorize: bool,
    finalize_on_finish: bool,
    authorization_requests: usize,
    pending_authorization: Option<AuthorizationReply>,
    availability_observer: Option<AvailabilitySink>,
    tasks: Vec<(MockTaskRecord, ResultSink)>,
}

/// In-memory speech engine.
///
/// Defaults: every locale supported, available, on-device capable, the user
/// authorizes from a background thread, and `finish()` produces a final
/// result repeating the last partial transcript.
#[derive(Debug, Clone)]
pub struct MockRecognitionEngine {
    state: Arc<Mutex<EngineState>>,
}

impl Default for MockRecognitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRecognitionEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                supported_locales: None,
                available: true,
                on_device: true,
                authorization: AuthorizationStatus::Authorized,
                auto_authorize: true,
                finalize_on_finish: true,
                authorization_requests: 0,
                pending_authorization: None,
                availability_observer: None,
                tasks: Vec::new(),
            })),
        }
    }

    /// Only these locales have a recognizer.
    pub fn with_supported_locales(self, locales: &[&str]) -> Self {
        lock(&self.state).supported_locales =
            Some(locales.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn with_availability(self, available: bool) -> Self {
        lock(&self.state).available = available;
        self
    }

    pub fn with_on_device(self, on_device: bool) -> Self {
        lock(&self.state).on_device = on_device;
        self
    }

    /// Answer every authorization request with `status`.
    pub fn with_authorization(self, status: AuthorizationStatus) -> Self {
        lock(&self.state).authorization = status;
        self
    }

    /// Hold authorization requests until `resolve_authorization` is called.
    pub fn with_manual_authorization(self) -> Self {
        lock(&self.state).auto_authorize = false;
        self
    }

    pub fn with_finalize_on_finish(self, finalize: bool) -> Self {
        lock(&self.state).finalize_on_finish = finalize;
        self
    }

    /// Answer the pending authorization request. Returns `false` when none
    /// is pending or the session is gone.
    pub fn resolve_authorization(&self, status: AuthorizationStatus) -> bool {
        let reply = lock(&self.state).pending_authorization.take();
        reply.map(|r| r.resolve(status)).unwrap_or(false)
    }

    pub fn authorization_requests(&self) -> usize {
        lock(&self.state).authorization_requests
    }

    /// Change availability and notify the registered observer.
    pub fn set_available(&self, available: bool) -> bool {
        let observer = {
            let mut state = lock(&self.state);
            state.available = available;
            state.availability_observer.clone()
        };
        observer
            .map(|o| o.availability_changed(available))
            .unwrap_or(false)
    }

    pub fn set_on_device(&self, on_device: bool) {
        lock(&self.state).on_device = on_device;
    }

    pub fn has_availability_observer(&self) -> bool {
        lock(&self.state).availability_observer.is_some()
    }

    /// Deliver a partial result on the most recent task.
    pub fn emit_partial(&self, text: &str) -> bool {
        self.emit_latest(Ok(RecognitionResult::partial(text)))
    }

    /// Deliver a final result on the most recent task.
    pub fn emit_final(&self, text: &str) -> bool {
        self.emit_latest(Ok(RecognitionResult::final_result(text)))
    }

    /// Fail the most recent task.
    pub fn emit_error(&self, message: &str) -> bool {
        self.emit_latest(Err(DictateError::Recognition(message.to_string())))
    }

    /// Deliver an outcome on task `index`, even if it was already released.
    pub fn emit_to(
        &self,
        index: usize,
        outcome: Result<RecognitionResult, DictateError>,
    ) -> bool {
        let sink = {
            let mut state = lock(&self.state);
            let Some((record, sink)) = state.tasks.get_mut(index) else {
                return false;
            };
            if let Ok(result) = &outcome {
                record.last_text = Some(result.text.clone());
                record.completed |= result.is_final;
            }
            sink.clone()
        };
        sink.deliver(outcome)
    }

    fn emit_latest(&self, outcome: Result<RecognitionResult, DictateError>) -> bool {
        let count = self.task_count();
        if count == 0 {
            return false;
        }
        self.emit_to(count - 1, outcome)
    }

    pub fn task_count(&self) -> usize {
        lock(&self.state).tasks.len()
    }

    pub fn task(&self, index: usize) -> Option<MockTaskRecord> {
        lock(&self.state).tasks.get(index).map(|(r, _)| r.clone())
    }

    /// Tasks neither cancelled nor completed.
    pub fn open_tasks(&self) -> usize {
        lock(&self.state)
            .tasks
            .iter()
            .filter(|(r, _)| r.is_open())
            .count()
    }
}

impl RecognitionEngine for MockRecognitionEngine {
    fn recognizer(&self, locale: &str) -> Option<Arc<dyn SpeechRecognizer>> {
        let supported = match &lock(&self.state).supported_locales {
            Some(locales) => locales.iter().any(|l| l.eq_ignore_ascii_case(locale)),
            None => true,
        };
        if !supported {
            return None;
        }
        Some(Arc::new(MockRecognizer {
            locale: locale.to_string(),
            state: Arc::clone(&self.state),
        }))
    }

    fn request_authorization(&self, reply: AuthorizationReply) {
        let mut state = lock(&self.state);
        state.authorization_requests += 1;
        if state.auto_authorize {
            let status = state.authorization;
            // The platform answers on a non-UI thread.
            std::thread::spawn(move || {
                reply.resolve(status);
            });
        } else {
            state.pending_authorization = Some(reply);
        }
    }
}

struct MockRecognizer {
    locale: String,
    state: Arc<Mutex<EngineState>>,
}

impl SpeechRecognizer for MockRecognizer {
    fn locale(&self) -> &str {
        &self.locale
    }

    fn is_available(&self) -> bool {
        lock(&self.state).available
    }

    fn supports_on_device_recognition(&self) -> bool {
        lock(&self.state).on_device
    }

    fn set_availability_observer(&self, observer: Option<AvailabilitySink>) {
        lock(&self.state).availability_observer = observer;
    }

    fn recognition_task(
        &self,
        options: &RequestOptions,
        results: ResultSink,
    ) -> Result<Box<dyn RecognitionTask>, DictateError> {
        let mut state = lock(&self.state);
        if !state.available {
            return Err(DictateError::Recognition(
                "Recognizer is not available".to_string(),
            ));
        }
        let record = MockTaskRecord {
            report_partial_results: options.report_partial_results,
            requires_on_device_recognition: options.requires_on_device_recognition,
            ..MockTaskRecord::default()
        };
        state.tasks.push((record, results));
        Ok(Box::new(MockTask {
            index: state.tasks.len() - 1,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockTask {
    index: usize,
    state: Arc<Mutex<EngineState>>,
}

impl MockTask {
    fn update<R>(&self, f: impl FnOnce(&mut MockTaskRecord) -> R) -> Option<R> {
        lock(&self.state)
            .tasks
            .get_mut(self.index)
            .map(|(record, _)| f(record))
    }
}

impl RecognitionTask for MockTask {
    fn append(&mut self, frame: &AudioFrame) {
        self.update(|r| {
            r.frames += 1;
            r.samples += frame.samples.len();
        });
    }

    fn end_audio(&mut self) {
        self.update(|r| r.audio_ended = true);
    }

    fn finish(&mut self) {
        let delivery = {
            let mut state = lock(&self.state);
            let finalize = state.finalize_on_finish;
            match state.tasks.get_mut(self.index) {
                Some((record, sink)) if record.is_open() => {
                    record.finish_requested = true;
                    if finalize {
                        record.completed = true;
                        let text = record.last_text.clone().unwrap_or_default();
                        Some((sink.clone(), text))
                    } else {
                        None
                    }
                }
                _ => None,
            }
        };
        if let Some((sink, text)) = delivery {
            sink.deliver(Ok(RecognitionResult::final_result(text)));
        }
    }

    fn cancel(&mut self) {
        self.update(|r| {
            if !r.completed {
                r.cancelled = true;
            }
        });
    }
}

// =============================================================================
// Audio capture
// =============================================================================

#[derive(Debug, Default)]
struct CaptureState {
    tap: Option<FrameSink>,
    last_tap: Option<FrameSink>,
    running: bool,
    fail_start: Option<String>,
    starts: usize,
    stops: usize,
    tap_installs: usize,
    tap_removals: usize,
}

/// Microphone stand-in. Frames are injected with `emit_frame`.
#[derive(Debug, Clone, Default)]
pub struct MockAudioCapture {
    state: Arc<Mutex<CaptureState>>,
}

impl MockAudioCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `start()` fail with `message` until cleared.
    pub fn fail_start(&self, message: Option<&str>) {
        lock(&self.state).fail_start = message.map(str::to_string);
    }

    /// Push a frame through the installed tap. Returns `false` without a tap.
    pub fn emit_frame(&self, frame: AudioFrame) -> bool {
        let tap = lock(&self.state).tap.clone();
        tap.map(|t| t.push(frame)).unwrap_or(false)
    }

    /// The most recently installed tap, kept after removal.
    pub fn last_tap(&self) -> Option<FrameSink> {
        lock(&self.state).last_tap.clone()
    }

    pub fn has_tap(&self) -> bool {
        lock(&self.state).tap.is_some()
    }

    pub fn starts(&self) -> usize {
        lock(&self.state).starts
    }

    pub fn stops(&self) -> usize {
        lock(&self.state).stops
    }

    pub fn tap_removals(&self) -> usize {
        lock(&self.state).tap_removals
    }
}

impl AudioCapture for MockAudioCapture {
    fn install_tap(&mut self, _buffer_size: u32, sink: FrameSink) -> Result<(), DictateError> {
        let mut state = lock(&self.state);
        if state.tap.is_some() {
            return Err(DictateError::Audio("A tap is already installed".to_string()));
        }
        state.tap = Some(sink.clone());
        state.last_tap = Some(sink);
        state.tap_installs += 1;
        Ok(())
    }

    fn remove_tap(&mut self) {
        let mut state = lock(&self.state);
        if state.tap.take().is_some() {
            state.tap_removals += 1;
        }
    }

    fn start(&mut self) -> Result<(), DictateError> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.fail_start {
            return Err(DictateError::Audio(message.clone()));
        }
        state.running = true;
        state.starts += 1;
        tracing::debug!("Mock audio capture started");
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = lock(&self.state);
        if state.running {
            state.running = false;
            state.stops += 1;
            tracing::debug!("Mock audio capture stopped");
        }
    }

    fn is_running(&self) -> bool {
        lock(&self.state).running
    }
}

// =============================================================================
// Audio session
// =============================================================================

#[derive(Debug, Default)]
struct AudioSessionState {
    fail_with: Option<String>,
    configurations: Vec<AudioSessionConfig>,
    active: bool,
    deactivations: usize,
}

/// Audio session stand-in that records every configuration applied.
#[derive(Debug, Clone, Default)]
pub struct MockAudioSession {
    state: Arc<Mutex<AudioSessionState>>,
}

impl MockAudioSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `configure()` fail with `message` (e.g. device busy) until cleared.
    pub fn fail_with(&self, message: Option<&str>) {
        lock(&self.state).fail_with = message.map(str::to_string);
    }

    pub fn configurations(&self) -> Vec<AudioSessionConfig> {
        lock(&self.state).configurations.clone()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).active
    }

    pub fn deactivations(&self) -> usize {
        lock(&self.state).deactivations
    }
}

impl AudioSession for MockAudioSession {
    fn configure(&mut self, config: &AudioSessionConfig) -> Result<(), DictateError> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.fail_with {
            return Err(DictateError::AudioSession(message.clone()));
        }
        state.configurations.push(config.clone());
        state.active = true;
        Ok(())
    }

    fn deactivate(&mut self, _notify_others: bool) {
        let mut state = lock(&self.state);
        if state.active {
            state.active = false;
            state.deactivations += 1;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
