//! Console view model driven by session events.
//!
//! Mirrors the dictation screen: a recognition button, an on-device
//! indicator light and the transcript text. The view never queries the
//! session; it only folds events.

use std::fmt;

use dictate_core::events::SessionEvent;

/// What the recognition button shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    NotAvailable,
    Disabled,
    Stopped,
    Recognizing,
}

impl ButtonState {
    pub fn title(&self) -> &'static str {
        match self {
            ButtonState::NotAvailable => "Recognition Not Available",
            ButtonState::Disabled => "Temporarily Unavailable",
            ButtonState::Stopped => "Start Recognition",
            ButtonState::Recognizing => "Stop Recognition",
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ButtonState::Stopped | ButtonState::Recognizing)
    }
}

/// Traffic-light indicator for on-device recognition support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indicator {
    Red,
    Green,
    /// Not known yet.
    #[default]
    Amber,
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::Red => write!(f, "red"),
            Indicator::Green => write!(f, "green"),
            Indicator::Amber => write!(f, "amber"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictationView {
    pub button: ButtonState,
    pub on_device: Indicator,
    pub transcript: String,
    /// Last human readable reason recognition was refused or failed.
    pub status: Option<String>,
}

impl Default for DictationView {
    fn default() -> Self {
        Self {
            button: ButtonState::Stopped,
            on_device: Indicator::Amber,
            transcript: String::new(),
            status: None,
        }
    }
}

impl DictationView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the view.
    pub fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::UnavailableForLocale { reason, .. } => {
                self.button = ButtonState::NotAvailable;
                self.status = Some(reason.clone());
            }
            SessionEvent::TemporarilyUnavailable { reason, .. } => {
                self.button = ButtonState::Disabled;
                self.status = Some(reason.clone());
            }
            SessionEvent::Authorized { authorized, .. } => {
                self.button = if *authorized {
                    ButtonState::Stopped
                } else {
                    ButtonState::Disabled
                };
            }
            SessionEvent::Ready { ready, .. } => {
                self.button = if *ready {
                    ButtonState::Stopped
                } else {
                    ButtonState::Disabled
                };
            }
            SessionEvent::OnDeviceSupport { available, .. } => {
                self.on_device = if *available {
                    Indicator::Green
                } else {
                    Indicator::Red
                };
            }
            SessionEvent::Disabled { reason, .. } => {
                self.button = ButtonState::Disabled;
                self.status = Some(reason.clone());
            }
            SessionEvent::Started { .. } => {
                self.button = ButtonState::Recognizing;
                self.status = None;
            }
            SessionEvent::TranscriptUpdate { text, .. } => {
                self.transcript = text.clone();
            }
            SessionEvent::Finished { .. } => {
                self.button = ButtonState::Stopped;
                self.status = event.failure_reason().map(str::to_string);
            }
            SessionEvent::StartFailed { reason, .. } => {
                self.button = ButtonState::Stopped;
                self.status = Some(reason.clone());
            }
            _ => {}
        }
    }

    /// One console line describing the screen.
    pub fn render(&self) -> String {
        let mut line = format!(
            "[{}{}] on-device: {} | {}",
            self.button.title(),
            if self.button.is_enabled() { "" } else { " (disabled)" },
            self.on_device,
            self.transcript,
        );
        if let Some(ref status) = self.status {
            line.push_str(&format!(" ({status})"));
        }
        line
    }
}
