//! Line store: ordered, uniquely keyed text lines.
//!
//! # Backends
//!
//! - [`FileLineStore`] - one `"<key>: <text>"` record per line in a plain text file
//! - [`PostgresLineStore`] - one row per line, append order by a serial column
//!
//! Both assign keys the same way: `last key + 1`, or `-1` when the store is
//! empty. Neither backend is safe under concurrent callers, so every call goes
//! through the [`LineStoreHandle`] actor, which owns the backend and serves one
//! request at a time.

pub mod actor;
pub mod file;
pub mod postgres;

pub use actor::LineStoreHandle;
pub use file::FileLineStore;
pub use postgres::PostgresLineStore;

use crate::config::StorageBackendKind;
use crate::errors::BinError;
use async_trait::async_trait;

/// Key assigned to the first line of an empty store.
pub const EMPTY_STORE_KEY: i64 = -1;

/// Storage backend contract.
///
/// `list` returns records formatted as `"<key>: <text>"` in append order.
#[async_trait]
pub trait LineStore: Send + Sync {
    /// Backend identity, for startup logging only.
    fn kind(&self) -> StorageBackendKind;

    /// Append a line and return its assigned key.
    async fn add(&self, text: &str) -> Result<i64, BinError>;

    /// Replace the text of the line with `key`, keeping its position.
    async fn modify(&self, key: i64, text: &str) -> Result<i64, BinError>;

    /// Remove the line with `key`.
    async fn delete(&self, key: i64) -> Result<i64, BinError>;

    /// All lines in append order.
    async fn list(&self) -> Result<Vec<String>, BinError>;
}

/// Key following `last`, or [`EMPTY_STORE_KEY`] for an empty store.
pub(crate) fn next_key(last: Option<i64>) -> Result<i64, BinError> {
    match last {
        None => Ok(EMPTY_STORE_KEY),
        Some(key) => key
            .checked_add(1)
            .ok_or_else(|| BinError::Corrupt(format!("key space exhausted after {key}"))),
    }
}

/// Format a persisted record.
#[must_use]
pub fn format_record(key: i64, text: &str) -> String {
    format!("{key}: {text}")
}

/// Parse the decimal key prefix of a record, if it has one.
#[must_use]
pub fn record_key(record: &str) -> Option<i64> {
    let (key, _) = record.split_once(':')?;
    key.trim().parse().ok()
}

/// Text of a record with its leading `"<key>:"` prefix removed.
///
/// Only the first colon separates key and text, so text may contain colons.
#[must_use]
pub fn record_text(record: &str) -> &str {
    match record.split_once(':') {
        Some((_, text)) => text.trim(),
        None => record.trim(),
    }
}

/// One line per record: embedded line breaks become spaces.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_next_key() {
        assert_eq!(next_key(None).unwrap(), -1);
        assert_eq!(next_key(Some(-1)).unwrap(), 0);
        assert_eq!(next_key(Some(41)).unwrap(), 42);
        assert!(matches!(next_key(Some(i64::MAX)), Err(BinError::Corrupt(_))));
    }

    #[test]
    fn test_record_key() {
        assert_eq!(record_key("-1: hello world"), Some(-1));
        assert_eq!(record_key("12: time: now"), Some(12));
        assert_eq!(record_key("no key here"), None);
        assert_eq!(record_key("abc: text"), None);
    }

    #[test]
    fn test_record_text_strips_only_first_prefix() {
        assert_eq!(record_text("-1: hello world"), "hello world");
        assert_eq!(record_text("3: Achtung: Müll!"), "Achtung: Müll!");
        assert_eq!(record_text("  bare text  "), "bare text");
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  two\nlines\r\n"), "two lines");
        assert_eq!(normalize_text("plain"), "plain");
    }

    #[test]
    fn test_format_record() {
        assert_eq!(format_record(-1, "hello"), "-1: hello");
        assert_eq!(format_record(7, ""), "7: ");
    }
}
