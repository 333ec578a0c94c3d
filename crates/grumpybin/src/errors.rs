//! GrumpyBin error types.
//!
//! Errors carry a human-readable description. The control plane publishes
//! that description verbatim inside ERROR responses, so messages must stay
//! free of connection strings and other secrets.

use thiserror::Error;

/// GrumpyBin error type.
///
/// Grouped by where the error is handled:
/// - Store errors (`KeyNotFound`, `Storage`, `Corrupt`, `Database`): converted
///   to an ERROR response by the dispatcher
/// - `Decode`: inbound payload dropped, nothing published
/// - `Transport`: logged, channel resubscribes
/// - `EmptyStore`, `Device`, `Speech`: logged, actuation sequence completes
#[derive(Debug, Error)]
pub enum BinError {
    /// No line with this key exists in the store.
    #[error("Line not found: {0}")]
    KeyNotFound(i64),

    /// File backend I/O failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Persisted data could not be parsed.
    #[error("Corrupt line store: {0}")]
    Corrupt(String),

    /// Database backend operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Inbound payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Pub/sub transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Line store holds no lines at speech time.
    #[error("Line store is empty, nothing to say")]
    EmptyStore,

    /// Sensor or actuator driver failure.
    #[error("Device error: {0}")]
    Device(String),

    /// Speech engine failure.
    #[error("Speech error: {0}")]
    Speech(String),

    /// Internal error (actor gone, task join failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BinError {
    /// Returns a bounded label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BinError::KeyNotFound(_) => "key_not_found",
            BinError::Storage(_) => "storage",
            BinError::Corrupt(_) => "corrupt",
            BinError::Database(_) => "database",
            BinError::Decode(_) => "decode",
            BinError::Transport(_) => "transport",
            BinError::EmptyStore => "empty_store",
            BinError::Device(_) => "device",
            BinError::Speech(_) => "speech",
            BinError::Internal(_) => "internal",
        }
    }

    /// Whether this error originates from the line store.
    #[must_use]
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            BinError::KeyNotFound(_)
                | BinError::Storage(_)
                | BinError::Corrupt(_)
                | BinError::Database(_)
        )
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        BinError::Storage(err.to_string())
    }
}

impl From<sqlx::Error> for BinError {
    fn from(err: sqlx::Error) -> Self {
        BinError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for BinError {
    fn from(err: redis::RedisError) -> Self {
        BinError::Transport(err.to_string())
    }
}

impl From<rumqttc::ClientError> for BinError {
    fn from(err: rumqttc::ClientError) -> Self {
        BinError::Transport(err.to_string())
    }
}

impl From<rumqttc::ConnectionError> for BinError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        BinError::Transport(err.to_string())
    }
}
