//! Hardware boundary.
//!
//! The activation and actuation logic only sees these traits. Concrete
//! drivers:
//!
//! - [`StdinTriggerSensor`], [`FileDistanceSensor`] - presence/distance input
//! - [`LogActuator`], [`GpioValueActuator`] - solenoid output
//! - [`CommandSpeechEngine`] - text-to-speech through an external program

pub mod actuator;
pub mod sensor;
pub mod speech;

pub use actuator::{GpioValueActuator, LogActuator};
pub use sensor::{FileDistanceSensor, StdinTriggerSensor};
pub use speech::CommandSpeechEngine;

use crate::errors::BinError;
use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// One sensor sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    /// Measured distance to the nearest object, in centimetres.
    Distance(f64),
    /// Boolean presence detector.
    Presence(bool),
}

impl SensorReading {
    /// Whether this reading means someone is standing at the bin.
    ///
    /// Distances count as presence strictly below `threshold_cm`.
    #[must_use]
    pub fn is_asserted(&self, threshold_cm: f64) -> bool {
        match *self {
            Self::Distance(cm) => cm < threshold_cm,
            Self::Presence(present) => present,
        }
    }
}

/// Actuator output level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => f.write_str("high"),
            Self::Low => f.write_str("low"),
        }
    }
}

/// Presence/distance input polled by the activation monitor.
#[async_trait]
pub trait ActivationSensor: Send + Sync {
    async fn read(&self) -> Result<SensorReading, BinError>;
}

/// Digital output driving the lid solenoid.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn set(&self, level: Level) -> Result<(), BinError>;
}

/// Text-to-speech output.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Speak `text`, returning early with `Ok(())` once `cancel_token` fires.
    async fn speak(&self, text: &str, cancel_token: &CancellationToken) -> Result<(), BinError>;
}
