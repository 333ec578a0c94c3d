//! GrumpyBin Library
//!
//! A waste bin that rattles its lid and insults whoever walks up to it.
//! The spoken lines are managed remotely over a pub/sub topic.
//!
//! # Architecture
//!
//! ```text
//! sensor ──poll──▶ ActivationMonitor ──fire──▶ ActuationCoordinator
//!                                               ├── pulse actuator
//!                                               └── speak random line ◀──┐
//!                                                                        │
//! pub/sub topic ◀──▶ ControlPlaneChannel ──▶ CommandDispatcher ──▶ LineStoreHandle
//!                                                                   (actor owning
//!                                                                    File/Database)
//! ```
//!
//! # Key Design Decisions
//!
//! - **One store owner**: the line store actor serialises every call, so the
//!   control plane and the speech effect never race on the backend
//! - **Drop, don't queue**: while a sequence runs further activations are ignored
//! - **Cancellation tokens everywhere**: one root token, cancelled on
//!   SIGINT/SIGTERM, reaches the monitor, the channel and every sequence
//!
//! # Modules
//!
//! - [`activation`] - sensor polling and fire policies
//! - [`actuation`] - activation guard and the pulse/speech sequence
//! - [`channel`] - pub/sub control plane
//! - [`config`] - configuration from environment
//! - [`devices`] - sensor, actuator and speech drivers
//! - [`errors`] - error type
//! - [`protocol`] - wire codec and command dispatch
//! - [`store`] - line store backends and actor

pub mod activation;
pub mod actuation;
pub mod channel;
pub mod config;
pub mod devices;
pub mod errors;
pub mod observability;
pub mod protocol;
pub mod store;
