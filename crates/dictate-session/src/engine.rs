//! Seams to the platform: speech recognition, audio input and audio session.
//!
//! None of these are implemented here. A platform binding provides them; the
//! `mock` module provides scriptable versions for tests and the demo binary.

use std::sync::Arc;

use dictate_core::config::AudioSessionConfig;
use dictate_core::error::DictateError;
use dictate_core::types::{AudioFrame, RequestOptions};

use crate::callback::{AuthorizationReply, AvailabilitySink, FrameSink, ResultSink};

/// Entry point of the platform speech framework.
pub trait RecognitionEngine: Send + 'static {
    /// Returns the recognizer for `locale`, or `None` if the locale is not
    /// supported at all. Supported does not mean currently available.
    fn recognizer(&self, locale: &str) -> Option<Arc<dyn SpeechRecognizer>>;

    /// Ask the user for permission to use speech recognition.
    ///
    /// The reply may be resolved later and from any thread.
    fn request_authorization(&self, reply: AuthorizationReply);
}

/// A recognizer bound to one locale.
pub trait SpeechRecognizer: Send + Sync {
    fn locale(&self) -> &str;

    /// Whether the recognizer can be used right now.
    fn is_available(&self) -> bool;

    /// Whether recognition can run without a network round trip.
    fn supports_on_device_recognition(&self) -> bool;

    /// Register (or clear, with `None`) the availability-change observer.
    fn set_availability_observer(&self, observer: Option<AvailabilitySink>);

    /// Create and submit a streaming recognition task.
    ///
    /// Results, partial and final, and failures are delivered through
    /// `results`, possibly from another thread.
    fn recognition_task(
        &self,
        options: &RequestOptions,
        results: ResultSink,
    ) -> Result<Box<dyn RecognitionTask>, DictateError>;
}

/// Handle of an in-flight recognition task.
pub trait RecognitionTask: Send {
    /// Feed one captured buffer.
    fn append(&mut self, frame: &AudioFrame);

    /// Mark the end of the audio stream.
    fn end_audio(&mut self);

    /// Stop accepting audio and produce a final result for what was heard.
    fn finish(&mut self);

    /// Abort the task. No final result is guaranteed.
    fn cancel(&mut self);
}

/// Microphone input.
pub trait AudioCapture: Send + 'static {
    /// Install the frame-forwarding tap on the input node.
    fn install_tap(&mut self, buffer_size: u32, sink: FrameSink) -> Result<(), DictateError>;

    /// Remove the tap. Frames are no longer forwarded afterwards.
    fn remove_tap(&mut self);

    fn start(&mut self) -> Result<(), DictateError>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Process-wide audio routing configuration.
pub trait AudioSession: Send + 'static {
    /// Apply category, mode and options, then activate the session.
    fn configure(&mut self, config: &AudioSessionConfig) -> Result<(), DictateError>;

    /// Deactivate after capture ends.
    fn deactivate(&mut self, notify_others: bool);
}
