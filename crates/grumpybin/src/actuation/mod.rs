//! Actuation: one lid-rattling, line-speaking sequence per activation.
//!
//! The [`ActuationCoordinator`] owns the activation guard. While a sequence
//! is in flight every further fire request is dropped, not queued. A
//! sequence runs two effects concurrently in one spawned task:
//!
//! - actuator pulsing ([`effects::pulse_actuator`])
//! - speech of one random stored line ([`effects::speak_random_line`])
//!
//! Both observe the sequence's cancellation token, a child of the process
//! shutdown token.

pub mod coordinator;
pub mod effects;

pub use coordinator::ActuationCoordinator;

use crate::config::Config;
use std::time::Duration;

/// Result of a fire request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// A new sequence was started.
    Launched,
    /// A sequence was already in flight; the request was ignored.
    Dropped,
}

impl FireOutcome {
    /// Metrics label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Launched => "launched",
            Self::Dropped => "dropped",
        }
    }
}

/// Shape of the actuator pulse train.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseConfig {
    /// Number of assert/de-assert cycles.
    pub count: u32,
    /// Time the output stays asserted per cycle.
    pub hold: Duration,
    /// Time the output stays de-asserted after each cycle.
    pub pause: Duration,
}

impl PulseConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            count: config.pulse_count,
            hold: config.pulse_hold,
            pause: config.pulse_pause,
        }
    }

    /// Length of an uncancelled pulse train.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        (self.hold + self.pause) * self.count
    }
}
