//! Sensor polling loop.

use super::FirePolicy;
use crate::actuation::{ActuationCoordinator, FireOutcome};
use crate::devices::ActivationSensor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Polls the sensor and hands activations to the coordinator.
pub struct ActivationMonitor {
    sensor: Arc<dyn ActivationSensor>,
    policy: FirePolicy,
    threshold_cm: f64,
    poll_interval: Duration,
    coordinator: ActuationCoordinator,
}

impl ActivationMonitor {
    #[must_use]
    pub fn new(
        sensor: Arc<dyn ActivationSensor>,
        policy: FirePolicy,
        threshold_cm: f64,
        poll_interval: Duration,
        coordinator: ActuationCoordinator,
    ) -> Self {
        Self {
            sensor,
            policy,
            threshold_cm,
            poll_interval,
            coordinator,
        }
    }

    /// Poll until `cancel_token` fires.
    ///
    /// Sensor errors skip the poll; the loop never exits on its own.
    #[instrument(skip_all, name = "grumpybin.activation.monitor")]
    pub async fn run(mut self, cancel_token: CancellationToken) {
        info!(
            target: "grumpybin.activation",
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            threshold_cm = self.threshold_cm,
            "Activation monitor starting"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.poll().await,
                () = cancel_token.cancelled() => {
                    info!(
                        target: "grumpybin.activation",
                        "Activation monitor received shutdown signal, exiting"
                    );
                    break;
                }
            }
        }

        info!(target: "grumpybin.activation", "Activation monitor stopped");
    }

    async fn poll(&mut self) {
        let reading = match self.sensor.read().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!(
                    target: "grumpybin.activation",
                    error = %e,
                    "Sensor read failed, skipping poll"
                );
                return;
            }
        };

        let asserted = reading.is_asserted(self.threshold_cm);
        if !self.policy.should_fire(asserted, Instant::now()) {
            return;
        }

        debug!(target: "grumpybin.activation", reading = ?reading, "Presence detected");
        if self.coordinator.fire() == FireOutcome::Dropped {
            debug!(target: "grumpybin.activation", "Activation ignored, sequence running");
        }
    }
}
