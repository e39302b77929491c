//! Dictate Session crate - Speech recognition session state machine.
//!
//! Drives one dictation flow through availability checks, authorization and
//! start/stop/cancel of streaming recognition, and publishes every outcome as
//! a `SessionEvent`. The platform speech framework, microphone and audio
//! session are reached through the traits in `engine`.

pub mod callback;
pub mod engine;
pub mod mock;
pub mod session;
pub mod state;

pub use callback::{AuthorizationReply, AvailabilitySink, FrameSink, ResultSink};
pub use engine::{AudioCapture, AudioSession, RecognitionEngine, RecognitionTask, SpeechRecognizer};
pub use mock::{MockAudioCapture, MockAudioSession, MockRecognitionEngine, MockTaskRecord};
pub use session::{DictationSession, SessionSnapshot};
pub use state::{SessionState, StateMachine};
