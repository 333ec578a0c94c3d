//! Activation: turns sensor readings into fire requests.
//!
//! The [`ActivationMonitor`] polls an [`crate::devices::ActivationSensor`]
//! at a fixed interval. A reading is asserted when presence is reported or
//! the measured distance is below the threshold; the [`FirePolicy`] then
//! decides whether to fire. Firing never waits for the sequence to finish.

pub mod monitor;
pub mod policy;

pub use monitor::ActivationMonitor;
pub use policy::FirePolicy;
