//! Actuation coordinator integration tests.
//!
//! Uses tokio's paused clock so pulse timing is deterministic.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use grumpybin::actuation::{ActuationCoordinator, FireOutcome, PulseConfig};
use grumpybin::devices::Level;
use grumpybin::store::LineStoreHandle;
use grumpybin_test_utils::{MemoryLineStore, MockSpeechEngine, RecordingActuator};
use tokio_util::sync::CancellationToken;

const PULSES: PulseConfig = PulseConfig {
    count: 6,
    hold: Duration::from_millis(100),
    pause: Duration::from_millis(400),
};

struct Setup {
    coordinator: ActuationCoordinator,
    actuator: RecordingActuator,
    speech: MockSpeechEngine,
    shutdown: CancellationToken,
}

fn setup(store: MemoryLineStore, actuator: RecordingActuator, speech: MockSpeechEngine) -> Setup {
    let shutdown = CancellationToken::new();
    let (handle, _task) = LineStoreHandle::spawn(Box::new(store), CancellationToken::new());
    let coordinator = ActuationCoordinator::new(
        Arc::new(actuator.clone()),
        Arc::new(speech.clone()),
        handle,
        PULSES,
        shutdown.clone(),
    );

    Setup {
        coordinator,
        actuator,
        speech,
        shutdown,
    }
}

// ============================================================================
// Activation guard
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_sequence_pulses_and_speaks_once() {
    let s = setup(
        MemoryLineStore::new().with_lines(&["Finger weg!"]),
        RecordingActuator::new(),
        MockSpeechEngine::instant(),
    );

    let started = tokio::time::Instant::now();
    assert_eq!(s.coordinator.fire(), FireOutcome::Launched);
    s.coordinator.wait_idle().await;

    let elapsed = started.elapsed();
    assert!(elapsed >= PULSES.total_duration());
    assert!(elapsed < PULSES.total_duration() + Duration::from_millis(50));
    assert_eq!(s.actuator.pulses(), 6);
    assert_eq!(s.actuator.last_level(), Some(Level::Low));
    assert_eq!(s.speech.spoken(), vec!["Finger weg!"]);
    assert!(!s.coordinator.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_fire_while_active_is_dropped() {
    let s = setup(
        MemoryLineStore::new().with_lines(&["Finger weg!"]),
        RecordingActuator::new(),
        MockSpeechEngine::taking(Duration::from_secs(2)),
    );

    assert_eq!(s.coordinator.fire(), FireOutcome::Launched);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(s.coordinator.is_active());
    assert_eq!(s.coordinator.fire(), FireOutcome::Dropped);
    assert_eq!(s.coordinator.fire(), FireOutcome::Dropped);

    s.coordinator.wait_idle().await;

    assert_eq!(s.speech.spoken().len(), 1);
    assert_eq!(s.actuator.pulses(), 6);

    // Guard is free again
    assert_eq!(s.coordinator.fire(), FireOutcome::Launched);
    s.coordinator.wait_idle().await;
    assert_eq!(s.speech.spoken().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_guard_held_until_slowest_effect_finishes() {
    let s = setup(
        MemoryLineStore::new().with_lines(&["Finger weg!"]),
        RecordingActuator::new(),
        MockSpeechEngine::taking(Duration::from_secs(10)),
    );

    s.coordinator.fire();

    // Pulsing is long over, speech is not
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(s.actuator.pulses(), 6);
    assert!(s.coordinator.is_active());

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(!s.coordinator.is_active());
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_sequence_stops_both_effects() {
    let s = setup(
        MemoryLineStore::new().with_lines(&["Finger weg!"]),
        RecordingActuator::new(),
        MockSpeechEngine::until_cancelled(),
    );

    s.coordinator.fire();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    let pulses_before = s.actuator.pulses();

    s.coordinator.cancel();
    tokio::time::timeout(PULSES.hold + PULSES.pause, s.coordinator.wait_idle())
        .await
        .expect("sequence should end within one pulse interval");

    assert!(!s.coordinator.is_active());
    assert_eq!(s.actuator.pulses(), pulses_before);
    assert!(pulses_before < 6);
    assert_eq!(s.actuator.last_level(), Some(Level::Low));
    assert_eq!(s.speech.cancellations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_token_cancels_sequence() {
    let s = setup(
        MemoryLineStore::new().with_lines(&["Finger weg!"]),
        RecordingActuator::new(),
        MockSpeechEngine::until_cancelled(),
    );

    s.coordinator.fire();
    tokio::time::sleep(Duration::from_millis(200)).await;
    s.shutdown.cancel();

    tokio::time::timeout(Duration::from_millis(500), s.coordinator.wait_idle())
        .await
        .expect("sequence should end after shutdown");
    assert_eq!(s.actuator.last_level(), Some(Level::Low));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_when_idle_is_noop() {
    let s = setup(
        MemoryLineStore::new(),
        RecordingActuator::new(),
        MockSpeechEngine::instant(),
    );

    s.coordinator.cancel();

    assert!(!s.coordinator.is_active());
    assert_eq!(s.coordinator.fire(), FireOutcome::Launched);
}

// ============================================================================
// Effect failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_empty_store_speaks_nothing_but_still_pulses() {
    let s = setup(
        MemoryLineStore::new(),
        RecordingActuator::new(),
        MockSpeechEngine::instant(),
    );

    s.coordinator.fire();
    s.coordinator.wait_idle().await;

    assert!(s.speech.spoken().is_empty());
    assert_eq!(s.actuator.pulses(), 6);
    assert!(!s.coordinator.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_actuator_failure_releases_guard() {
    let s = setup(
        MemoryLineStore::new().with_lines(&["Finger weg!"]),
        RecordingActuator::failing(),
        MockSpeechEngine::instant(),
    );

    s.coordinator.fire();
    s.coordinator.wait_idle().await;

    // First write failed, then the output was reset
    assert_eq!(s.actuator.levels(), vec![Level::High, Level::Low]);
    assert_eq!(s.speech.spoken().len(), 1);
    assert_eq!(s.coordinator.fire(), FireOutcome::Launched);
}

#[tokio::test(start_paused = true)]
async fn test_speech_failure_does_not_cut_pulsing_short() {
    let s = setup(
        MemoryLineStore::new().with_lines(&["Finger weg!"]),
        RecordingActuator::new(),
        MockSpeechEngine::failing(),
    );

    s.coordinator.fire();
    s.coordinator.wait_idle().await;

    assert_eq!(s.actuator.pulses(), 6);
    assert!(!s.coordinator.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_speaks_one_of_the_stored_lines() {
    let lines = ["Geh weg", "Nicht schon wieder: du", "Ich bin voll"];
    let s = setup(
        MemoryLineStore::new().with_lines(&lines),
        RecordingActuator::new(),
        MockSpeechEngine::instant(),
    );

    for _ in 0..10 {
        s.coordinator.fire();
        s.coordinator.wait_idle().await;
    }

    let spoken = s.speech.spoken();
    assert_eq!(spoken.len(), 10);
    assert!(spoken.iter().all(|text| lines.contains(&text.as_str())));
}
