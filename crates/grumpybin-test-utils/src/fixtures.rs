//! Wire fixtures for control-plane tests.

use grumpybin::protocol::{encode, MessageMethod, MessageStatus, MessageType, WireMessage};

/// Topic used by tests.
pub const TEST_TOPIC: &str = "grumpybin/test";

/// Builder for REQUEST payloads.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    message: WireMessage,
}

impl RequestBuilder {
    /// Request with the given method, key `-1` and empty line.
    #[must_use]
    pub fn new(method: MessageMethod) -> Self {
        Self {
            message: WireMessage {
                kind: MessageType::Request,
                method,
                status: MessageStatus::None,
                ..WireMessage::default()
            },
        }
    }

    #[must_use]
    pub fn key(mut self, key: i64) -> Self {
        self.message.key = key;
        self
    }

    #[must_use]
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.message.line = line.into();
        self
    }

    #[must_use]
    pub fn build(self) -> WireMessage {
        self.message
    }

    /// Encoded payload.
    #[must_use]
    pub fn payload(self) -> Vec<u8> {
        encode(&self.message).expect("wire message should encode")
    }
}

#[must_use]
pub fn add_request(line: &str) -> Vec<u8> {
    RequestBuilder::new(MessageMethod::Add).line(line).payload()
}

#[must_use]
pub fn edit_request(key: i64, line: &str) -> Vec<u8> {
    RequestBuilder::new(MessageMethod::Edit)
        .key(key)
        .line(line)
        .payload()
}

#[must_use]
pub fn delete_request(key: i64) -> Vec<u8> {
    RequestBuilder::new(MessageMethod::Delete).key(key).payload()
}

#[must_use]
pub fn get_request() -> Vec<u8> {
    RequestBuilder::new(MessageMethod::Get).payload()
}

/// A raw JSON payload, for testing lenient decoding.
#[must_use]
pub fn raw_payload(value: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(value).expect("JSON value should serialize")
}
