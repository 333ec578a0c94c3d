//! In-memory line store backend.
//!
//! Same key rule and record format as the real backends, without I/O.

use async_trait::async_trait;
use grumpybin::config::StorageBackendKind;
use grumpybin::errors::BinError;
use grumpybin::store::{format_record, LineStore, EMPTY_STORE_KEY};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MemoryLineStoreInner {
    lines: Vec<(i64, String)>,
    fail_all: bool,
}

/// Mock `LineStore`. Clones share state, so a test can keep one clone to
/// inspect what the store actor wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryLineStore {
    inner: Arc<Mutex<MemoryLineStoreInner>>,
}

impl MemoryLineStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with lines, keyed as successive adds would be.
    #[must_use]
    pub fn with_lines(self, lines: &[&str]) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            for line in lines {
                let key = next_key(&inner.lines);
                inner.lines.push((key, (*line).to_string()));
            }
        }
        self
    }

    /// Every operation fails with a storage error.
    #[must_use]
    pub fn failing(self) -> Self {
        self.inner.lock().unwrap().fail_all = true;
        self
    }

    /// Current records, formatted as the backends list them.
    #[must_use]
    pub fn records(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .lines
            .iter()
            .map(|(key, text)| format_record(*key, text))
            .collect()
    }

    fn check(inner: &MemoryLineStoreInner) -> Result<(), BinError> {
        if inner.fail_all {
            Err(BinError::Storage("memory store failure".to_string()))
        } else {
            Ok(())
        }
    }
}

fn next_key(lines: &[(i64, String)]) -> i64 {
    lines.last().map_or(EMPTY_STORE_KEY, |(key, _)| key + 1)
}

#[async_trait]
impl LineStore for MemoryLineStore {
    fn kind(&self) -> StorageBackendKind {
        StorageBackendKind::File
    }

    async fn add(&self, text: &str) -> Result<i64, BinError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check(&inner)?;
        let key = next_key(&inner.lines);
        inner.lines.push((key, text.to_string()));
        Ok(key)
    }

    async fn modify(&self, key: i64, text: &str) -> Result<i64, BinError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check(&inner)?;
        let entry = inner
            .lines
            .iter_mut()
            .find(|(k, _)| *k == key)
            .ok_or(BinError::KeyNotFound(key))?;
        entry.1 = text.to_string();
        Ok(key)
    }

    async fn delete(&self, key: i64) -> Result<i64, BinError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check(&inner)?;
        let position = inner
            .lines
            .iter()
            .position(|(k, _)| *k == key)
            .ok_or(BinError::KeyNotFound(key))?;
        inner.lines.remove(position);
        Ok(key)
    }

    async fn list(&self) -> Result<Vec<String>, BinError> {
        Self::check(&self.inner.lock().unwrap())?;
        Ok(self.records())
    }
}
