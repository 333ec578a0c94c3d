//! Wire format for the control-plane topic.
//!
//! Every payload is one JSON object:
//!
//! ```json
//! {"type": "REQUEST", "line": "hello world", "key": -1, "status": "NONE", "method": "ADD"}
//! ```
//!
//! Decoding is lenient about enum fields: a missing, `null` or unknown
//! `type`/`status`/`method` becomes `NONE`. A missing `line` becomes `""` and
//! a missing `key` becomes `-1`. Anything that is not a JSON object with that
//! shape is a decode error.

use crate::errors::BinError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key value meaning "no key".
pub const NO_KEY: i64 = -1;

/// Message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "Option<String>")]
pub enum MessageType {
    Request,
    Response,
    #[default]
    None,
}

impl From<Option<String>> for MessageType {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("REQUEST") => Self::Request,
            Some("RESPONSE") => Self::Response,
            _ => Self::None,
        }
    }
}

/// Result status carried by responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "Option<String>")]
pub enum MessageStatus {
    Success,
    Error,
    #[default]
    None,
}

impl From<Option<String>> for MessageStatus {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("SUCCESS") => Self::Success,
            Some("ERROR") => Self::Error,
            _ => Self::None,
        }
    }
}

/// Line store operation requested by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "Option<String>")]
pub enum MessageMethod {
    Add,
    Edit,
    Delete,
    Get,
    #[default]
    None,
}

impl MessageMethod {
    /// Wire name, also used as a metrics label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Edit => "EDIT",
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for MessageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Option<String>> for MessageMethod {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("ADD") => Self::Add,
            Some("EDIT") => Self::Edit,
            Some("DELETE") => Self::Delete,
            Some("GET") => Self::Get,
            _ => Self::None,
        }
    }
}

fn default_key() -> i64 {
    NO_KEY
}

/// The record exchanged on the topic, in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    #[serde(default)]
    pub line: String,
    #[serde(default = "default_key")]
    pub key: i64,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default)]
    pub method: MessageMethod,
}

impl Default for WireMessage {
    fn default() -> Self {
        Self {
            kind: MessageType::None,
            line: String::new(),
            key: NO_KEY,
            status: MessageStatus::None,
            method: MessageMethod::None,
        }
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: ({}, key={}, {:?})", self.kind, self.method, self.key, self.line)
    }
}

/// Decode a payload received from the topic.
///
/// # Errors
///
/// Returns `BinError::Decode` for invalid UTF-8, invalid JSON or a
/// field of the wrong JSON type.
pub fn decode(payload: &[u8]) -> Result<WireMessage, BinError> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| BinError::Decode(format!("payload is not UTF-8: {e}")))?;
    serde_json::from_str(text).map_err(|e| BinError::Decode(e.to_string()))
}

/// Encode a message for publishing.
///
/// # Errors
///
/// Returns `BinError::Internal` if serialization fails.
pub fn encode(message: &WireMessage) -> Result<Vec<u8>, BinError> {
    serde_json::to_vec(message).map_err(|e| BinError::Internal(format!("encode failed: {e}")))
}

/// An operator request, consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub method: MessageMethod,
    pub key: i64,
    pub text: String,
}

impl Command {
    /// Interpret a decoded message; `None` unless it is a REQUEST.
    #[must_use]
    pub fn from_wire(message: WireMessage) -> Option<Self> {
        match message.kind {
            MessageType::Request => Some(Self {
                method: message.method,
                key: message.key,
                text: message.line,
            }),
            MessageType::Response | MessageType::None => None,
        }
    }

    /// Build the REQUEST wire record for this command.
    #[must_use]
    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            kind: MessageType::Request,
            line: self.text.clone(),
            key: self.key,
            status: MessageStatus::None,
            method: self.method,
        }
    }
}

/// Dispatcher outcome, published once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: MessageStatus,
    pub key: Option<i64>,
    pub text: String,
}

impl Response {
    #[must_use]
    pub fn success(key: Option<i64>, text: impl Into<String>) -> Self {
        Self {
            status: MessageStatus::Success,
            key,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            status: MessageStatus::Error,
            key: None,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == MessageStatus::Success
    }

    /// Build the RESPONSE wire record. A missing key is sent as `-1`.
    #[must_use]
    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            kind: MessageType::Response,
            line: self.text.clone(),
            key: self.key.unwrap_or(NO_KEY),
            status: self.status,
            method: MessageMethod::None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_request() {
        let payload =
            br#"{"type":"REQUEST","method":"ADD","line":"hello world","key":-1,"status":"NONE"}"#;

        let message = decode(payload).unwrap();

        assert_eq!(message.kind, MessageType::Request);
        assert_eq!(message.method, MessageMethod::Add);
        assert_eq!(message.line, "hello world");
        assert_eq!(message.key, -1);
        assert_eq!(message.status, MessageStatus::None);
    }

    #[test]
    fn test_decode_missing_fields_use_defaults() {
        let message = decode(br#"{"type":"REQUEST"}"#).unwrap();

        assert_eq!(message.method, MessageMethod::None);
        assert_eq!(message.status, MessageStatus::None);
        assert_eq!(message.line, "");
        assert_eq!(message.key, NO_KEY);
    }

    #[test]
    fn test_decode_unknown_and_null_enums_become_none() {
        let message =
            decode(br#"{"type":"SHOUT","method":"PATCH","status":null,"line":"x","key":3}"#)
                .unwrap();

        assert_eq!(message.kind, MessageType::None);
        assert_eq!(message.method, MessageMethod::None);
        assert_eq!(message.status, MessageStatus::None);
        assert_eq!(message.key, 3);
    }

    #[test]
    fn test_decode_enum_matching_is_exact() {
        let message = decode(br#"{"type":"request","method":"add"}"#).unwrap();
        assert_eq!(message.kind, MessageType::None);
        assert_eq!(message.method, MessageMethod::None);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode(b"not json"), Err(BinError::Decode(_))));
        assert!(matches!(decode(&[0xff, 0xfe, 0x00]), Err(BinError::Decode(_))));
        assert!(matches!(
            decode(br#"{"type":"REQUEST","key":"five"}"#),
            Err(BinError::Decode(_))
        ));
        assert!(matches!(decode(br#"[1,2,3]"#), Err(BinError::Decode(_))));
    }

    #[test]
    fn test_encode_response_shape() {
        let response = Response::success(Some(-1), "Added line: -1: hello world");

        let bytes = encode(&response.to_wire()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "RESPONSE",
                "line": "Added line: -1: hello world",
                "key": -1,
                "status": "SUCCESS",
                "method": "NONE"
            })
        );
    }

    #[test]
    fn test_error_response_without_key_encodes_minus_one() {
        let wire = Response::error("Line not found: 9").to_wire();
        assert_eq!(wire.key, NO_KEY);
        assert_eq!(wire.status, MessageStatus::Error);
        assert_eq!(wire.kind, MessageType::Response);
    }

    #[test]
    fn test_command_only_from_requests() {
        let request = decode(br#"{"type":"REQUEST","method":"DELETE","key":4}"#).unwrap();
        let command = Command::from_wire(request).unwrap();
        assert_eq!(command.method, MessageMethod::Delete);
        assert_eq!(command.key, 4);

        let response = decode(br#"{"type":"RESPONSE","status":"SUCCESS"}"#).unwrap();
        assert!(Command::from_wire(response).is_none());

        let untyped = decode(br#"{"method":"GET"}"#).unwrap();
        assert!(Command::from_wire(untyped).is_none());
    }
}
