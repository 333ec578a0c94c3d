//! # GrumpyBin Test Utilities
//!
//! Mock implementations and fixtures for testing GrumpyBin without a
//! broker, a database or hardware.
//!
//! ## Modules
//!
//! - `mock_broker` - In-memory pub/sub broker implementing `PubSubTransport`
//! - `memory_store` - In-memory `LineStore` backend
//! - `mock_devices` - Scripted sensor, recording actuator, mock speech engine
//! - `fixtures` - Wire request builders and response helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grumpybin_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let broker = MockBroker::new();
//!     let channel = ControlPlaneChannel::new(
//!         broker.transport(),
//!         dispatcher,
//!         TEST_TOPIC,
//!         Duration::from_secs(5),
//!     );
//!     tokio::spawn(channel.run(token.clone()));
//!
//!     broker.wait_for_subscribers(TEST_TOPIC, 1).await;
//!     broker.inject(TEST_TOPIC, add_request("hello world"));
//!     let responses = broker.wait_for_responses(1).await;
//! }
//! ```

pub mod fixtures;
pub mod memory_store;
pub mod mock_broker;
pub mod mock_devices;

// Re-export commonly used items
pub use fixtures::*;
pub use memory_store::*;
pub use mock_broker::*;
pub use mock_devices::*;
