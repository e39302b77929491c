//! End-to-end scenarios for the dictation session.
//!
//! Each test spawns its own session on mock collaborators and observes it
//! only through the event stream and `snapshot()`.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use dictate_core::config::DictateConfig;
use dictate_core::events::SessionEvent;
use dictate_core::types::{
    AudioFrame, AuthorizationStatus, FinishReason, UnavailableReason, MSG_ACCESS_DENIED,
    MSG_NOT_AUTHORIZED, MSG_RESTRICTED,
};
use dictate_session::{
    AudioCapture, DictationSession, MockAudioCapture, MockAudioSession, MockRecognitionEngine,
    SessionState,
};

// =============================================================================
// Helpers
// =============================================================================

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    session: DictationSession,
    events: broadcast::Receiver<SessionEvent>,
    engine: MockRecognitionEngine,
    capture: MockAudioCapture,
    audio: MockAudioSession,
}

fn test_config() -> DictateConfig {
    let mut config = DictateConfig::default();
    config.session.stop_timeout_ms = 100;
    config
}

fn harness_with(engine: MockRecognitionEngine, config: DictateConfig) -> Harness {
    let capture = MockAudioCapture::new();
    let audio = MockAudioSession::new();
    let session = DictationSession::spawn(engine.clone(), capture.clone(), audio.clone(), config);
    let events = session.subscribe();
    Harness {
        session,
        events,
        engine,
        capture,
        audio,
    }
}

fn harness(engine: MockRecognitionEngine) -> Harness {
    harness_with(engine, test_config())
}

async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed")
}

/// Assert nothing else was emitted once every queued message was applied.
async fn assert_quiet(h: &mut Harness) {
    h.session.snapshot().await.unwrap();
    match h.events.try_recv() {
        Err(TryRecvError::Empty) => {}
        other => panic!("Expected no further events, got {:?}", other),
    }
}

async fn expect_ready(h: &mut Harness, on_device: bool) {
    assert!(matches!(
        next_event(&mut h.events).await,
        SessionEvent::Authorized {
            authorized: true,
            ..
        }
    ));
    assert!(matches!(
        next_event(&mut h.events).await,
        SessionEvent::Ready { ready: true, .. }
    ));
    match next_event(&mut h.events).await {
        SessionEvent::OnDeviceSupport { available, .. } => assert_eq!(available, on_device),
        other => panic!("Expected OnDeviceSupport, got {:?}", other),
    }
}

async fn ready_harness(engine: MockRecognitionEngine) -> Harness {
    let mut h = harness(engine);
    h.session.initialize().unwrap();
    expect_ready(&mut h, true).await;
    h
}

async fn expect_started(h: &mut Harness) -> uuid::Uuid {
    match next_event(&mut h.events).await {
        SessionEvent::Started { session_id, .. } => session_id,
        other => panic!("Expected Started, got {:?}", other),
    }
}

async fn expect_transcript(h: &mut Harness, text: &str, is_final: bool) {
    match next_event(&mut h.events).await {
        SessionEvent::TranscriptUpdate {
            text: t,
            is_final: f,
            ..
        } => {
            assert_eq!(t, text);
            assert_eq!(f, is_final);
        }
        other => panic!("Expected TranscriptUpdate, got {:?}", other),
    }
}

async fn expect_finished_for(h: &mut Harness) -> (uuid::Uuid, FinishReason) {
    match next_event(&mut h.events).await {
        SessionEvent::Finished { session_id, reason, .. } => (session_id, reason),
        other => panic!("Expected Finished, got {:?}", other),
    }
}

async fn expect_finished(h: &mut Harness) -> FinishReason {
    match next_event(&mut h.events).await {
        SessionEvent::Finished { reason, .. } => reason,
        other => panic!("Expected Finished, got {:?}", other),
    }
}

fn frame(value: f32) -> AudioFrame {
    AudioFrame::new(vec![value; 1024], 16_000)
}

// =============================================================================
// Initialization
// =============================================================================

#[tokio::test]
async fn test_initialize_authorized_emits_ready_sequence() {
    let mut h = harness(MockRecognitionEngine::new().with_on_device(false));
    assert_eq!(h.session.state(), SessionState::Uninitialized);

    h.session.initialize().unwrap();
    expect_ready(&mut h, false).await;

    let snapshot = h.session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Ready);
    assert!(!snapshot.supports_on_device_recognition);
    assert!(snapshot.active_session.is_none());
    assert_eq!(h.engine.authorization_requests(), 1);
}

#[tokio::test]
async fn test_locale_unsupported_is_terminal() {
    let engine = MockRecognitionEngine::new().with_supported_locales(&["fr-FR"]);
    let mut h = harness(engine);

    h.session.initialize().unwrap();
    match next_event(&mut h.events).await {
        SessionEvent::UnavailableForLocale { locale, reason, .. } => {
            assert_eq!(locale, "en-US");
            assert_eq!(reason, UnavailableReason::LocaleUnsupported.message());
        }
        other => panic!("Expected UnavailableForLocale, got {:?}", other),
    }
    assert_quiet(&mut h).await;

    h.session.start_stop().unwrap();
    h.session.start().unwrap();
    assert_quiet(&mut h).await;

    assert_eq!(
        h.session.state(),
        SessionState::Unavailable(UnavailableReason::LocaleUnsupported)
    );
    assert_eq!(h.engine.authorization_requests(), 0);
    assert_eq!(h.engine.task_count(), 0);
}

#[tokio::test]
async fn test_temporarily_unavailable_then_heals() {
    let mut h = harness(MockRecognitionEngine::new().with_availability(false));

    h.session.initialize().unwrap();
    assert!(matches!(
        next_event(&mut h.events).await,
        SessionEvent::TemporarilyUnavailable { .. }
    ));
    assert_quiet(&mut h).await;

    // start_stop is a no-op while unavailable.
    h.session.start_stop().unwrap();
    assert_quiet(&mut h).await;
    assert_eq!(h.engine.task_count(), 0);
    assert_eq!(h.engine.authorization_requests(), 0);

    // Availability returns: authorization is requested and the flow resumes.
    assert!(h.engine.set_available(true));
    expect_ready(&mut h, true).await;
    assert_eq!(h.session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_authorization_denied() {
    let engine = MockRecognitionEngine::new().with_authorization(AuthorizationStatus::Denied);
    let mut h = harness(engine);

    h.session.initialize().unwrap();
    assert!(matches!(
        next_event(&mut h.events).await,
        SessionEvent::Authorized {
            authorized: false,
            ..
        }
    ));
    match next_event(&mut h.events).await {
        SessionEvent::Disabled { reason, .. } => assert_eq!(reason, MSG_ACCESS_DENIED),
        other => panic!("Expected Disabled, got {:?}", other),
    }
    assert_quiet(&mut h).await;
    assert_eq!(h.session.state(), SessionState::AuthorizationDenied);

    h.session.start_stop().unwrap();
    assert_quiet(&mut h).await;
    assert_eq!(h.engine.task_count(), 0);
}

#[tokio::test]
async fn test_authorization_restricted_only_disables() {
    let engine = MockRecognitionEngine::new().with_authorization(AuthorizationStatus::Restricted);
    let mut h = harness(engine);

    h.session.initialize().unwrap();
    match next_event(&mut h.events).await {
        SessionEvent::Disabled { reason, .. } => assert_eq!(reason, MSG_RESTRICTED),
        other => panic!("Expected Disabled, got {:?}", other),
    }
    assert_quiet(&mut h).await;
    assert_eq!(h.session.state(), SessionState::AuthorizationRestricted);
}

#[tokio::test]
async fn test_undetermined_authorization_is_recoverable() {
    let engine = MockRecognitionEngine::new().with_manual_authorization();
    let mut h = harness(engine);

    h.session.initialize().unwrap();
    h.session.snapshot().await.unwrap();
    assert!(h
        .engine
        .resolve_authorization(AuthorizationStatus::NotDetermined));
    match next_event(&mut h.events).await {
        SessionEvent::Disabled { reason, .. } => assert_eq!(reason, MSG_NOT_AUTHORIZED),
        other => panic!("Expected Disabled, got {:?}", other),
    }
    assert_eq!(
        h.session.snapshot().await.unwrap().state,
        SessionState::NotReady
    );

    // Asking again works.
    h.session.initialize().unwrap();
    h.session.snapshot().await.unwrap();
    assert!(h.engine.resolve_authorization(AuthorizationStatus::Authorized));
    expect_ready(&mut h, true).await;
}

#[tokio::test]
async fn test_stale_authorization_reply_is_ignored() {
    let engine = MockRecognitionEngine::new().with_manual_authorization();
    let mut h = harness(engine);

    h.session.initialize().unwrap();
    h.session.snapshot().await.unwrap();
    h.session.shutdown().unwrap();
    h.session.snapshot().await.unwrap();

    // The reply belongs to the initialize() before shutdown.
    assert!(h.engine.resolve_authorization(AuthorizationStatus::Authorized));
    assert_quiet(&mut h).await;
    assert_eq!(h.session.state(), SessionState::Uninitialized);
}

// =============================================================================
// Recognition
// =============================================================================

#[tokio::test]
async fn test_start_stream_and_final_result() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start_stop().unwrap();
    let id = expect_started(&mut h).await;
    assert_eq!(h.session.state(), SessionState::Recognizing);
    assert!(h.capture.has_tap());
    assert_eq!(h.audio.configurations().len(), 1);

    assert!(h.engine.emit_partial("hello"));
    assert!(h.engine.emit_final("hello world"));

    expect_transcript(&mut h, "hello", false).await;
    expect_transcript(&mut h, "hello world", true).await;
    assert_eq!(expect_finished(&mut h).await, FinishReason::Completed);

    let snapshot = h.session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(snapshot.transcript.as_deref(), Some("hello world"));
    assert!(snapshot.active_session.is_none());
    assert!(!h.capture.is_running());
    assert!(!h.capture.has_tap());
    assert!(!h.audio.is_active());
    assert_ne!(id, uuid::Uuid::nil());
    assert_quiet(&mut h).await;
}

#[tokio::test]
async fn test_graceful_stop_waits_for_final_result() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
    assert!(h.engine.emit_partial("take a note"));
    expect_transcript(&mut h, "take a note", false).await;

    h.session.start_stop().unwrap();
    // finish() yields the final result for what was heard.
    expect_transcript(&mut h, "take a note", true).await;
    assert_eq!(expect_finished(&mut h).await, FinishReason::Completed);

    let record = h.engine.task(0).unwrap();
    assert!(record.audio_ended);
    assert!(record.finish_requested);
    assert!(!record.cancelled);
    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.capture.stops(), 1);
}

#[tokio::test]
async fn test_rapid_double_tap_yields_one_start() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start_stop().unwrap();
    h.session.start_stop().unwrap();

    expect_started(&mut h).await;
    expect_transcript(&mut h, "", true).await;
    assert_eq!(expect_finished(&mut h).await, FinishReason::Completed);
    assert_quiet(&mut h).await;

    assert_eq!(h.engine.task_count(), 1);
    assert_eq!(h.engine.open_tasks(), 0);
    assert_eq!(h.session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_start_while_recognizing_supersedes_silently() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start().unwrap();
    let first = expect_started(&mut h).await;
    h.session.start().unwrap();
    let second = expect_started(&mut h).await;
    assert_ne!(first, second);
    assert_quiet(&mut h).await;

    // Never two open requests.
    assert_eq!(h.engine.task_count(), 2);
    assert_eq!(h.engine.open_tasks(), 1);
    assert!(h.engine.task(0).unwrap().cancelled);

    // Late results of the superseded task are ignored.
    assert!(h.engine.emit_to(
        0,
        Ok(dictate_core::types::RecognitionResult::final_result("old"))
    ));
    assert_quiet(&mut h).await;
    assert_eq!(h.session.state(), SessionState::Recognizing);
}

#[tokio::test]
async fn test_start_while_stopping_supersedes_silently() {
    let engine = MockRecognitionEngine::new().with_finalize_on_finish(false);
    let mut h = ready_harness(engine).await;

    h.session.start_stop().unwrap();
    let first = expect_started(&mut h).await;
    h.session.start_stop().unwrap();
    h.session.snapshot().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Stopping);

    h.session.start().unwrap();
    let second = expect_started(&mut h).await;
    assert_ne!(first, second);
    assert_quiet(&mut h).await;
    assert_eq!(h.session.state(), SessionState::Recognizing);
    assert!(h.engine.task(0).unwrap().cancelled);
    assert_eq!(h.engine.open_tasks(), 1);

    // The deadline of the superseded stop must not end the new request.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_quiet(&mut h).await;
    assert_eq!(h.session.state(), SessionState::Recognizing);

    h.session.cancel().unwrap();
    let (id, reason) = expect_finished_for(&mut h).await;
    assert_eq!(id, second);
    assert_eq!(reason, FinishReason::Cancelled);
}

#[tokio::test]
async fn test_start_after_availability_lost_finishes_old_request() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start().unwrap();
    let first = expect_started(&mut h).await;
    assert!(h.engine.set_available(false));
    assert!(matches!(
        next_event(&mut h.events).await,
        SessionEvent::Ready { ready: false, .. }
    ));
    next_event(&mut h.events).await;

    // No replacement can start, so the old request must be reported ended.
    h.session.start().unwrap();
    let (id, reason) = expect_finished_for(&mut h).await;
    assert_eq!(id, first);
    assert_eq!(reason, FinishReason::Cancelled);
    assert_quiet(&mut h).await;

    assert_eq!(
        h.session.state(),
        SessionState::Unavailable(UnavailableReason::TemporarilyUnavailable)
    );
    assert_eq!(h.engine.task_count(), 1);
    assert_eq!(h.engine.open_tasks(), 0);
    assert!(!h.capture.has_tap());
}

#[tokio::test]
async fn test_failed_replacement_start_finishes_old_request() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start().unwrap();
    let first = expect_started(&mut h).await;
    h.audio.fail_with(Some("device busy"));

    h.session.start().unwrap();
    let (id, reason) = expect_finished_for(&mut h).await;
    assert_eq!(id, first);
    assert_eq!(reason, FinishReason::Cancelled);
    match next_event(&mut h.events).await {
        SessionEvent::StartFailed { reason, .. } => assert!(reason.contains("device busy")),
        other => panic!("Expected StartFailed, got {:?}", other),
    }
    assert_quiet(&mut h).await;

    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.engine.task_count(), 1);
    assert_eq!(h.engine.open_tasks(), 0);
    assert!(!h.audio.is_active());

    h.audio.fail_with(None);
    h.session.start().unwrap();
    expect_started(&mut h).await;
}

#[tokio::test]
async fn test_final_is_followed_by_one_finished_before_next_start() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;
    let mut names = Vec::new();

    for round in 0..3 {
        h.session.start_stop().unwrap();
        loop {
            let event = next_event(&mut h.events).await;
            names.push(event.event_name());
            if matches!(event, SessionEvent::Started { .. }) {
                break;
            }
        }
        assert!(h.engine.emit_partial(&format!("round {}", round)));
        assert!(h.engine.emit_final(&format!("round {} done", round)));
        loop {
            let event = next_event(&mut h.events).await;
            names.push(event.event_name());
            if matches!(event, SessionEvent::Finished { .. }) {
                break;
            }
        }
    }

    let mut awaiting_finished = false;
    let mut finished_count = 0;
    for (i, name) in names.iter().enumerate() {
        match *name {
            "started" => assert!(!awaiting_finished, "started before finished at {}", i),
            "transcript_update" if names.get(i + 1) == Some(&"finished") => {
                awaiting_finished = true
            }
            "finished" => {
                assert!(awaiting_finished);
                awaiting_finished = false;
                finished_count += 1;
            }
            _ => {}
        }
    }
    assert_eq!(finished_count, 3);
}

#[tokio::test]
async fn test_engine_error_ends_session_without_crash() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
    assert!(h.engine.emit_error("network connection lost"));

    match expect_finished(&mut h).await {
        FinishReason::Failed { reason } => assert!(reason.contains("network connection lost")),
        other => panic!("Expected Failed, got {:?}", other),
    }
    assert_eq!(h.session.state(), SessionState::Ready);
    assert!(!h.capture.is_running());

    // A new session can start right away.
    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
}

#[tokio::test]
async fn test_stop_deadline_cancels_silent_task() {
    let engine = MockRecognitionEngine::new().with_finalize_on_finish(false);
    let mut h = ready_harness(engine).await;

    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
    h.session.start_stop().unwrap();
    h.session.snapshot().await.unwrap();
    assert_eq!(h.session.state(), SessionState::Stopping);

    // Stopping ignores further taps.
    h.session.start_stop().unwrap();
    assert_eq!(expect_finished(&mut h).await, FinishReason::TimedOut);
    assert!(h.engine.task(0).unwrap().cancelled);
    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.engine.task_count(), 1);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_when_idle_is_noop() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.cancel().unwrap();
    h.session.cancel().unwrap();
    assert_quiet(&mut h).await;
    assert_eq!(h.session.state(), SessionState::Ready);

    let mut fresh = harness(MockRecognitionEngine::new());
    fresh.session.cancel().unwrap();
    assert_quiet(&mut fresh).await;
    assert_eq!(fresh.session.state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn test_cancel_discards_request() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
    assert!(h.engine.emit_partial("half a sen"));
    expect_transcript(&mut h, "half a sen", false).await;

    h.session.cancel().unwrap();
    assert_eq!(expect_finished(&mut h).await, FinishReason::Cancelled);
    h.session.cancel().unwrap();
    assert_quiet(&mut h).await;

    let record = h.engine.task(0).unwrap();
    assert!(record.cancelled);
    assert!(!record.finish_requested);
    assert_eq!(h.session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_shutdown_returns_to_uninitialized() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
    h.session.shutdown().unwrap();
    assert_eq!(expect_finished(&mut h).await, FinishReason::Cancelled);
    h.session.snapshot().await.unwrap();

    assert_eq!(h.session.state(), SessionState::Uninitialized);
    assert!(!h.engine.has_availability_observer());
    assert!(!h.capture.is_running());

    // Availability changes after teardown are not reported.
    h.engine.set_available(false);
    assert_quiet(&mut h).await;

    // The owning screen appears again.
    h.engine.set_available(true);
    h.session.initialize().unwrap();
    expect_ready(&mut h, true).await;
}

#[tokio::test]
async fn test_initialize_while_recognizing_cancels_first() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
    h.session.initialize().unwrap();

    assert_eq!(expect_finished(&mut h).await, FinishReason::Cancelled);
    expect_ready(&mut h, true).await;
    assert_eq!(h.engine.open_tasks(), 0);
}

#[tokio::test]
async fn test_dropping_handles_tears_down() {
    let h = ready_harness(MockRecognitionEngine::new()).await;
    let Harness {
        session,
        mut events,
        engine,
        capture,
        ..
    } = h;

    session.start_stop().unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Started { .. }
    ));
    drop(session);

    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Finished {
            reason: FinishReason::Cancelled,
            ..
        }
    ));
    assert_eq!(engine.open_tasks(), 0);
    assert!(!capture.is_running());
}

// =============================================================================
// Audio
// =============================================================================

#[tokio::test]
async fn test_frames_forwarded_in_order_and_dropped_after_teardown() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
    for i in 0..200 {
        assert!(h.capture.emit_frame(frame(i as f32 / 200.0)));
    }
    let snapshot = h.session.snapshot().await.unwrap();
    assert_eq!(snapshot.frames_forwarded, 200);
    assert_eq!(h.engine.task(0).unwrap().frames, 200);

    h.session.cancel().unwrap();
    expect_finished(&mut h).await;

    // A late frame through the removed tap is discarded quietly.
    let stale_tap = h.capture.last_tap().unwrap();
    assert!(stale_tap.push(frame(0.9)));
    assert_quiet(&mut h).await;
    assert_eq!(h.engine.task(0).unwrap().frames, 200);
    assert!(!h.capture.emit_frame(frame(0.9)));
}

#[tokio::test]
async fn test_audio_session_failure_reports_start_failed() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;
    h.audio.fail_with(Some("device busy"));

    h.session.start_stop().unwrap();
    match next_event(&mut h.events).await {
        SessionEvent::StartFailed { reason, .. } => assert!(reason.contains("device busy")),
        other => panic!("Expected StartFailed, got {:?}", other),
    }
    assert_quiet(&mut h).await;
    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.engine.task_count(), 0);
    assert!(!h.capture.has_tap());

    h.audio.fail_with(None);
    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
}

#[tokio::test]
async fn test_capture_failure_releases_task() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;
    h.capture.fail_start(Some("no input device"));

    h.session.start_stop().unwrap();
    match next_event(&mut h.events).await {
        SessionEvent::StartFailed { reason, .. } => assert!(reason.contains("no input device")),
        other => panic!("Expected StartFailed, got {:?}", other),
    }
    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.engine.open_tasks(), 0);
    assert!(!h.capture.has_tap());
    assert!(!h.audio.is_active());
}

#[tokio::test]
async fn test_audio_session_configuration_applied() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start_stop().unwrap();
    expect_started(&mut h).await;

    let applied = h.audio.configurations();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0], DictateConfig::default().audio_session);
    assert!(applied[0].duck_others);
}

// =============================================================================
// Availability & options
// =============================================================================

#[tokio::test]
async fn test_availability_lost_and_regained_while_ready() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.engine.set_on_device(false);
    assert!(h.engine.set_available(false));
    assert!(matches!(
        next_event(&mut h.events).await,
        SessionEvent::Ready { ready: false, .. }
    ));
    assert!(matches!(
        next_event(&mut h.events).await,
        SessionEvent::OnDeviceSupport {
            available: false,
            ..
        }
    ));
    assert_eq!(
        h.session.snapshot().await.unwrap().state,
        SessionState::Unavailable(UnavailableReason::TemporarilyUnavailable)
    );

    h.session.start_stop().unwrap();
    assert_quiet(&mut h).await;

    assert!(h.engine.set_available(true));
    assert!(matches!(
        next_event(&mut h.events).await,
        SessionEvent::Ready { ready: true, .. }
    ));
    assert!(matches!(
        next_event(&mut h.events).await,
        SessionEvent::OnDeviceSupport { .. }
    ));
    assert_eq!(h.session.state(), SessionState::Ready);
    // Already authorized: no second prompt.
    assert_eq!(h.engine.authorization_requests(), 1);
}

#[tokio::test]
async fn test_availability_lost_while_recognizing_settles_after_finish() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;

    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
    assert!(h.engine.set_available(false));
    assert!(matches!(
        next_event(&mut h.events).await,
        SessionEvent::Ready { ready: false, .. }
    ));
    next_event(&mut h.events).await;
    assert_eq!(
        h.session.snapshot().await.unwrap().state,
        SessionState::Recognizing
    );

    assert!(h.engine.emit_error("recognizer went away"));
    expect_finished(&mut h).await;
    assert_eq!(
        h.session.snapshot().await.unwrap().state,
        SessionState::Unavailable(UnavailableReason::TemporarilyUnavailable)
    );
}

#[tokio::test]
async fn test_on_device_preference() {
    let mut h = ready_harness(MockRecognitionEngine::new()).await;
    h.session.start_stop().unwrap();
    match next_event(&mut h.events).await {
        SessionEvent::Started { on_device, .. } => assert!(on_device),
        other => panic!("Expected Started, got {:?}", other),
    }
    let record = h.engine.task(0).unwrap();
    assert!(record.requires_on_device_recognition);
    assert!(record.report_partial_results);

    let mut config = test_config();
    config.recognition.prefer_on_device = false;
    let mut h = harness_with(MockRecognitionEngine::new(), config);
    h.session.initialize().unwrap();
    expect_ready(&mut h, true).await;
    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
    assert!(!h.engine.task(0).unwrap().requires_on_device_recognition);
}

#[tokio::test]
async fn test_listening_prompt_follows_started() {
    let mut config = test_config();
    config.session.listening_prompt = "Go ahead, I'm listening...".to_string();
    let mut h = harness_with(MockRecognitionEngine::new(), config);
    h.session.initialize().unwrap();
    expect_ready(&mut h, true).await;

    h.session.start_stop().unwrap();
    expect_started(&mut h).await;
    expect_transcript(&mut h, "Go ahead, I'm listening...", false).await;

    // The prompt is not a transcript.
    assert!(h.session.snapshot().await.unwrap().transcript.is_none());
}
