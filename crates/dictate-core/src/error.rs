use thiserror::Error;

/// Top-level error type for the dictation system.
///
/// Variants are grouped by the collaborator that produced the failure. None
/// of them is fatal to the process: the session converts every asynchronous
/// failure into a state transition plus an event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DictateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio capture error: {0}")]
    Audio(String),

    #[error("Audio session error: {0}")]
    AudioSession(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dictation session is closed")]
    SessionClosed,
}

impl From<toml::de::Error> for DictateError {
    fn from(err: toml::de::Error) -> Self {
        DictateError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DictateError {
    fn from(err: toml::ser::Error) -> Self {
        DictateError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DictateError {
    fn from(err: serde_json::Error) -> Self {
        DictateError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for dictation operations.
pub type Result<T> = std::result::Result<T, DictateError>;
