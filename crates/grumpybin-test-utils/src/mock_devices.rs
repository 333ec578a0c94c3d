//! Mock sensor, actuator and speech engine.
//!
//! # Example
//!
//! ```rust,ignore
//! use grumpybin_test_utils::*;
//!
//! let sensor = ScriptedSensor::new()
//!     .then_distance(120.0)
//!     .then_distance(15.0)
//!     .then_failure();
//! let actuator = RecordingActuator::new();
//! let speech = MockSpeechEngine::until_cancelled();
//! ```

use async_trait::async_trait;
use grumpybin::devices::{ActivationSensor, Actuator, Level, SensorReading, SpeechEngine};
use grumpybin::errors::BinError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Sensor
// ============================================================================

/// Sensor returning a fixed script of readings, one per `read`.
///
/// `None` entries are read failures. Once the script is exhausted every
/// read returns the idle reading (`Presence(false)` unless overridden).
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    script: Arc<Mutex<VecDeque<Option<SensorReading>>>>,
    idle: SensorReading,
    reads: Arc<AtomicUsize>,
}

impl Default for ScriptedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSensor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            idle: SensorReading::Presence(false),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sensor that reports presence on every read.
    #[must_use]
    pub fn always_present() -> Self {
        Self::new().idle_reading(SensorReading::Presence(true))
    }

    #[must_use]
    pub fn idle_reading(mut self, reading: SensorReading) -> Self {
        self.idle = reading;
        self
    }

    #[must_use]
    pub fn then(self, reading: SensorReading) -> Self {
        self.script.lock().unwrap().push_back(Some(reading));
        self
    }

    #[must_use]
    pub fn then_distance(self, cm: f64) -> Self {
        self.then(SensorReading::Distance(cm))
    }

    #[must_use]
    pub fn then_presence(self, present: bool) -> Self {
        self.then(SensorReading::Presence(present))
    }

    #[must_use]
    pub fn then_failure(self) -> Self {
        self.script.lock().unwrap().push_back(None);
        self
    }

    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivationSensor for ScriptedSensor {
    async fn read(&self) -> Result<SensorReading, BinError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Some(reading)) => Ok(reading),
            Some(None) => Err(BinError::Device("scripted sensor failure".to_string())),
            None => Ok(self.idle),
        }
    }
}

// ============================================================================
// Actuator
// ============================================================================

/// Actuator recording every level it is set to.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    levels: Arc<Mutex<Vec<Level>>>,
    fail: bool,
}

impl RecordingActuator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Actuator whose every write fails (levels are still recorded).
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn levels(&self) -> Vec<Level> {
        self.levels.lock().unwrap().clone()
    }

    /// Number of times the output was asserted.
    #[must_use]
    pub fn pulses(&self) -> usize {
        self.levels().iter().filter(|l| **l == Level::High).count()
    }

    #[must_use]
    pub fn last_level(&self) -> Option<Level> {
        self.levels().last().copied()
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn set(&self, level: Level) -> Result<(), BinError> {
        self.levels.lock().unwrap().push(level);
        if self.fail {
            Err(BinError::Device("recording actuator failure".to_string()))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Speech
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum SpeechBehavior {
    Instant,
    Takes(Duration),
    UntilCancelled,
    Fail,
}

/// Speech engine recording what it was asked to say.
#[derive(Debug, Clone)]
pub struct MockSpeechEngine {
    behavior: SpeechBehavior,
    spoken: Arc<Mutex<Vec<String>>>,
    cancelled: Arc<AtomicUsize>,
}

impl MockSpeechEngine {
    fn with_behavior(behavior: SpeechBehavior) -> Self {
        Self {
            behavior,
            spoken: Arc::new(Mutex::new(Vec::new())),
            cancelled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns as soon as it is called.
    #[must_use]
    pub fn instant() -> Self {
        Self::with_behavior(SpeechBehavior::Instant)
    }

    /// Speaks for `duration` unless cancelled.
    #[must_use]
    pub fn taking(duration: Duration) -> Self {
        Self::with_behavior(SpeechBehavior::Takes(duration))
    }

    /// Speaks until cancelled.
    #[must_use]
    pub fn until_cancelled() -> Self {
        Self::with_behavior(SpeechBehavior::UntilCancelled)
    }

    /// Fails every call with a speech error.
    #[must_use]
    pub fn failing() -> Self {
        Self::with_behavior(SpeechBehavior::Fail)
    }

    /// Texts passed to `speak`, in call order.
    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// Number of `speak` calls that ended through cancellation.
    #[must_use]
    pub fn cancellations(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechEngine for MockSpeechEngine {
    async fn speak(&self, text: &str, cancel_token: &CancellationToken) -> Result<(), BinError> {
        self.spoken.lock().unwrap().push(text.to_string());

        match self.behavior {
            SpeechBehavior::Instant => Ok(()),
            SpeechBehavior::Fail => Err(BinError::Speech("mock speech failure".to_string())),
            SpeechBehavior::Takes(duration) => {
                tokio::select! {
                    () = cancel_token.cancelled() => {
                        self.cancelled.fetch_add(1, Ordering::SeqCst);
                    }
                    () = tokio::time::sleep(duration) => {}
                }
                Ok(())
            }
            SpeechBehavior::UntilCancelled => {
                cancel_token.cancelled().await;
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}
