//! Sensor drivers.

use super::{ActivationSensor, SensorReading};
use crate::errors::BinError;
use async_trait::async_trait;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keyboard trigger for running without hardware.
///
/// Every line read from the input latches presence; the next `read`
/// reports `Presence(true)` and clears the latch.
///
/// Input is read on a plain OS thread, outside the runtime, so a pending
/// read never holds up runtime shutdown.
pub struct StdinTriggerSensor {
    latch: Arc<AtomicBool>,
}

impl StdinTriggerSensor {
    /// Watch the process's stdin.
    ///
    /// # Errors
    ///
    /// Returns `BinError::Device` if the reader thread cannot be started.
    pub fn spawn() -> Result<Self, BinError> {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    /// Watch an arbitrary line-oriented reader until it reaches EOF.
    ///
    /// # Errors
    ///
    /// Returns `BinError::Device` if the reader thread cannot be started.
    pub fn from_reader<R>(reader: R) -> Result<Self, BinError>
    where
        R: BufRead + Send + 'static,
    {
        let latch = Arc::new(AtomicBool::new(false));
        let thread_latch = Arc::clone(&latch);

        std::thread::Builder::new()
            .name("grumpybin-trigger".to_string())
            .spawn(move || watch_lines(reader, &thread_latch))
            .map_err(|e| BinError::Device(format!("failed to start trigger reader: {e}")))?;

        Ok(Self { latch })
    }
}

fn watch_lines<R: BufRead>(reader: R, latch: &AtomicBool) {
    for line in reader.lines() {
        match line {
            Ok(_) => {
                debug!(target: "grumpybin.devices.sensor", "Keyboard trigger");
                latch.store(true, Ordering::SeqCst);
            }
            Err(e) => {
                warn!(
                    target: "grumpybin.devices.sensor",
                    error = %e,
                    "Failed to read trigger input"
                );
                return;
            }
        }
    }

    info!(target: "grumpybin.devices.sensor", "Trigger input closed");
}

#[async_trait]
impl ActivationSensor for StdinTriggerSensor {
    async fn read(&self) -> Result<SensorReading, BinError> {
        Ok(SensorReading::Presence(self.latch.swap(false, Ordering::SeqCst)))
    }
}

/// Distance sensor exposed as a file holding a decimal number of cm.
pub struct FileDistanceSensor {
    path: PathBuf,
}

impl FileDistanceSensor {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ActivationSensor for FileDistanceSensor {
    async fn read(&self) -> Result<SensorReading, BinError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| BinError::Device(format!("sensor read failed: {e}")))?;

        let cm: f64 = raw
            .trim()
            .parse()
            .map_err(|e| BinError::Device(format!("invalid distance '{}': {e}", raw.trim())))?;

        Ok(SensorReading::Distance(cm))
    }
}
