//! Dictate application binary - composition root.
//!
//! Wires a dictation session to simulated platform collaborators and plays
//! one dictation through it:
//! 1. Load configuration from TOML and resolve CLI/env overrides
//! 2. Spawn the session actor and subscribe to its events
//! 3. Initialize; once ready, start recognition and feed the utterance
//! 4. Stop gracefully and print every event through the console view

mod cli;
mod view;

use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use dictate_core::config::DictateConfig;
use dictate_core::events::SessionEvent;
use dictate_core::types::{AudioFrame, AuthorizationStatus};
use dictate_session::{DictationSession, MockAudioCapture, MockAudioSession, MockRecognitionEngine};

use cli::CliArgs;
use view::DictationView;

/// Locales the simulated recognizer knows about.
const SIMULATED_LOCALES: &[&str] = &[
    "en-US", "en-GB", "en-AU", "en-CA", "fr-FR", "fr-CA", "de-DE", "es-ES", "es-MX", "it-IT",
    "ja-JP", "ko-KR", "nl-NL", "pt-BR", "zh-CN",
];

const SAMPLE_RATE: u32 = 16_000;
const FRAMES_PER_WORD: usize = 4;
const WORD_PACE: Duration = Duration::from_millis(120);
const RECOVERY_DELAY: Duration = Duration::from_millis(500);
const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Simulated platform: the speaker and the devices behind the session.
#[derive(Clone)]
struct Simulator {
    engine: MockRecognitionEngine,
    capture: MockAudioCapture,
    buffer_size: usize,
}

impl Simulator {
    /// Speak `utterance` word by word: audio frames, then a partial result.
    async fn speak(self, session: DictationSession, utterance: String) {
        let mut heard = String::new();
        for word in utterance.split_whitespace() {
            for _ in 0..FRAMES_PER_WORD {
                let frame = AudioFrame::new(vec![0.0; self.buffer_size], SAMPLE_RATE);
                if !self.capture.emit_frame(frame) {
                    tracing::debug!("Capture tap gone, speaker stops");
                    return;
                }
            }
            if !heard.is_empty() {
                heard.push(' ');
            }
            heard.push_str(word);
            self.engine.emit_partial(&heard);
            tokio::time::sleep(WORD_PACE).await;
        }

        tracing::debug!(words = utterance.split_whitespace().count(), "Utterance spoken");
        if let Err(e) = session.start_stop() {
            tracing::warn!(error = %e, "Failed to stop recognition");
        }
    }

    /// Bring a temporarily unavailable recognizer back after a while.
    async fn recover(self) {
        tokio::time::sleep(RECOVERY_DELAY).await;
        tracing::info!("Simulated recognizer available again");
        self.engine.set_available(true);
    }
}

fn print_event(event: &SessionEvent, view: &mut DictationView, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
        }
        return;
    }
    view.apply(event);
    println!("{:<18} {}", event.event_name(), view.render());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = DictateConfig::load_or_default(&config_file);
    config.recognition.locale = args.resolve_locale(&config.recognition.locale);
    config.general.log_level = args.resolve_log_level(&config.general.log_level);

    // Tracing.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Dictate v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %config_file.display(),
        locale = %config.recognition.locale,
        "Configuration loaded"
    );

    // Simulated platform.
    let authorization = AuthorizationStatus::from(args.authorization);
    let engine = MockRecognitionEngine::new()
        .with_supported_locales(SIMULATED_LOCALES)
        .with_availability(!args.unavailable)
        .with_on_device(!args.no_on_device)
        .with_authorization(authorization);
    let capture = MockAudioCapture::new();
    let simulator = Simulator {
        engine: engine.clone(),
        capture: capture.clone(),
        buffer_size: config.recognition.tap_buffer_size as usize,
    };

    // Session.
    let session = DictationSession::spawn(engine, capture, MockAudioSession::new(), config);
    let mut events = session.subscribe();
    session.initialize()?;

    let mut view = DictationView::new();
    let mut started = false;

    loop {
        let event = match tokio::time::timeout(IDLE_TIMEOUT, events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(RecvError::Lagged(skipped))) => {
                tracing::warn!(skipped, "Event consumer lagged");
                continue;
            }
            Ok(Err(RecvError::Closed)) => break,
            Err(_) => {
                tracing::warn!(state = %session.state(), "No session activity, giving up");
                break;
            }
        };
        print_event(&event, &mut view, args.json);

        match event {
            SessionEvent::Ready { ready: true, .. } if !started => {
                started = true;
                session.start_stop()?;
            }
            SessionEvent::Started { .. } => {
                tokio::spawn(simulator.clone().speak(session.clone(), args.utterance.clone()));
            }
            SessionEvent::TemporarilyUnavailable { .. } if !started => {
                tokio::spawn(simulator.clone().recover());
            }
            SessionEvent::Finished { .. }
            | SessionEvent::UnavailableForLocale { .. }
            | SessionEvent::Disabled { .. } => break,
            SessionEvent::StartFailed { reason, .. } => {
                tracing::error!(reason = %reason, "Recognition could not start");
                break;
            }
            _ => {}
        }
    }

    let snapshot = session.snapshot().await?;
    tracing::info!(
        state = %snapshot.state,
        transcript = snapshot.transcript.as_deref().unwrap_or(""),
        "Dictation finished"
    );
    session.shutdown()?;

    Ok(())
}
