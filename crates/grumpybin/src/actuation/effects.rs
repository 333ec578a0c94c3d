//! The two effects of an actuation sequence.

use super::PulseConfig;
use crate::devices::{Actuator, Level, SpeechEngine};
use crate::errors::BinError;
use crate::store::{record_text, LineStoreHandle};
use rand::seq::SliceRandom;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pulse the actuator `config.count` times, stopping early on cancellation.
///
/// The output is de-asserted on every exit path, including a failed write
/// mid-train.
pub async fn pulse_actuator(
    actuator: &dyn Actuator,
    config: PulseConfig,
    cancel_token: &CancellationToken,
) -> Result<(), BinError> {
    let pulsed = pulse_cycles(actuator, config, cancel_token).await;
    let reset = actuator.set(Level::Low).await;
    pulsed.and(reset)
}

async fn pulse_cycles(
    actuator: &dyn Actuator,
    config: PulseConfig,
    cancel_token: &CancellationToken,
) -> Result<(), BinError> {
    for cycle in 0..config.count {
        if cancel_token.is_cancelled() {
            break;
        }

        actuator.set(Level::High).await?;
        if sleep_or_cancelled(config.hold, cancel_token).await {
            debug!(target: "grumpybin.actuation", cycle = cycle, "Pulsing cancelled");
            break;
        }

        actuator.set(Level::Low).await?;
        if sleep_or_cancelled(config.pause, cancel_token).await {
            debug!(target: "grumpybin.actuation", cycle = cycle, "Pulsing cancelled");
            break;
        }
    }

    Ok(())
}

/// Returns `true` if the token fired before `duration` elapsed.
async fn sleep_or_cancelled(duration: Duration, cancel_token: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel_token.cancelled() => true,
        () = tokio::time::sleep(duration) => false,
    }
}

/// Speak the text of one line chosen uniformly at random.
///
/// # Errors
///
/// `BinError::EmptyStore` if there is nothing to say; store and speech
/// errors are passed through.
pub async fn speak_random_line(
    store: &LineStoreHandle,
    speech: &dyn SpeechEngine,
    cancel_token: &CancellationToken,
) -> Result<(), BinError> {
    let lines = tokio::select! {
        () = cancel_token.cancelled() => {
            debug!(target: "grumpybin.actuation", "Speech cancelled while reading lines");
            return Ok(());
        }
        lines = store.list() => lines?,
    };

    let line = lines
        .choose(&mut rand::thread_rng())
        .ok_or(BinError::EmptyStore)?;

    if cancel_token.is_cancelled() {
        return Ok(());
    }

    let text = record_text(line);
    debug!(target: "grumpybin.actuation", text = %text, "Speaking line");
    speech.speak(text, cancel_token).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::StorageBackendKind;
    use crate::store::{FileLineStore, LineStore};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Levels(Mutex<Vec<Level>>);

    #[async_trait]
    impl Actuator for Levels {
        async fn set(&self, level: Level) -> Result<(), BinError> {
            self.0.lock().unwrap().push(level);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Spoken(Mutex<Vec<String>>);

    #[async_trait]
    impl SpeechEngine for Spoken {
        async fn speak(&self, text: &str, _cancel: &CancellationToken) -> Result<(), BinError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    /// Store whose listing takes far longer than a pulse interval.
    struct SlowStore;

    #[async_trait]
    impl LineStore for SlowStore {
        fn kind(&self) -> StorageBackendKind {
            StorageBackendKind::Database
        }

        async fn add(&self, _text: &str) -> Result<i64, BinError> {
            Ok(-1)
        }

        async fn modify(&self, key: i64, _text: &str) -> Result<i64, BinError> {
            Ok(key)
        }

        async fn delete(&self, key: i64) -> Result<i64, BinError> {
            Ok(key)
        }

        async fn list(&self) -> Result<Vec<String>, BinError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec!["-1: zu spät".to_string()])
        }
    }

    fn pulses(count: u32) -> PulseConfig {
        PulseConfig {
            count,
            hold: Duration::from_millis(100),
            pause: Duration::from_millis(400),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_pulse_train() {
        let actuator = Levels::default();

        pulse_actuator(&actuator, pulses(3), &CancellationToken::new())
            .await
            .unwrap();

        let levels = actuator.0.lock().unwrap().clone();
        assert_eq!(
            levels,
            vec![
                Level::High,
                Level::Low,
                Level::High,
                Level::Low,
                Level::High,
                Level::Low,
                Level::Low
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_pulse_train_ends_low() {
        let actuator = Levels::default();
        let token = CancellationToken::new();
        token.cancel();

        pulse_actuator(&actuator, pulses(6), &token).await.unwrap();

        assert_eq!(actuator.0.lock().unwrap().as_slice(), &[Level::Low]);
    }

    #[tokio::test]
    async fn test_speaks_text_without_key_prefix() {
        let dir = TempDir::new().unwrap();
        let store = FileLineStore::open(dir.path().join("lines")).await.unwrap();
        let (handle, _task) = LineStoreHandle::spawn(Box::new(store), CancellationToken::new());
        handle.add("Nimm deinen Müll: sofort").await.unwrap();
        let speech = Spoken::default();

        speak_random_line(&handle, &speech, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            speech.0.lock().unwrap().as_slice(),
            &["Nimm deinen Müll: sofort".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_store_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = FileLineStore::open(dir.path().join("lines")).await.unwrap();
        let (handle, _task) = LineStoreHandle::spawn(Box::new(store), CancellationToken::new());
        let speech = Spoken::default();

        let result = speak_random_line(&handle, &speech, &CancellationToken::new()).await;

        assert!(matches!(result, Err(BinError::EmptyStore)));
        assert!(speech.0.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_slow_store_read() {
        let (handle, _task) = LineStoreHandle::spawn(Box::new(SlowStore), CancellationToken::new());
        let speech = Spoken::default();
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        speak_random_line(&handle, &speech, &token).await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(speech.0.lock().unwrap().is_empty());
    }
}
