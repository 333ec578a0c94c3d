//! Actuator drivers.

use super::{Actuator, Level};
use crate::errors::BinError;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Actuator without hardware: traces every level change.
#[derive(Debug, Default)]
pub struct LogActuator;

#[async_trait]
impl Actuator for LogActuator {
    async fn set(&self, level: Level) -> Result<(), BinError> {
        debug!(target: "grumpybin.devices.actuator", level = %level, "Actuator output");
        Ok(())
    }
}

/// Solenoid on a sysfs GPIO line. The pin must already be exported and
/// configured as an output.
pub struct GpioValueActuator {
    value_path: PathBuf,
}

impl GpioValueActuator {
    #[must_use]
    pub fn new(value_path: impl Into<PathBuf>) -> Self {
        Self {
            value_path: value_path.into(),
        }
    }
}

#[async_trait]
impl Actuator for GpioValueActuator {
    async fn set(&self, level: Level) -> Result<(), BinError> {
        let value = match level {
            Level::High => "1",
            Level::Low => "0",
        };

        tokio::fs::write(&self.value_path, value)
            .await
            .map_err(|e| BinError::Device(format!("GPIO write failed: {e}")))
    }
}
