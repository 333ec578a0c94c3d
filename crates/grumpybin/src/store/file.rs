//! File-backed line store.
//!
//! Every call reads the whole file; mutations other than `add` rewrite it.
//! There is no locking here: callers must serialize access (see
//! [`super::LineStoreHandle`]).

use super::{format_record, next_key, normalize_text, record_key, LineStore};
use crate::config::StorageBackendKind;
use crate::errors::BinError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument};

/// Line store persisted as `"<key>: <text>\n"` records.
#[derive(Debug, Clone)]
pub struct FileLineStore {
    path: PathBuf,
}

impl FileLineStore {
    /// Open the store at `path`, creating an empty file if none exists.
    ///
    /// # Errors
    ///
    /// Returns `BinError::Storage` if the file cannot be created or opened.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, BinError> {
        let path = path.into();

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                error!(
                    target: "grumpybin.store.file",
                    error = %e,
                    path = %path.display(),
                    "Failed to open lines file"
                );
                BinError::Storage(format!("Failed to open lines file: {e}"))
            })?;

        Ok(Self { path })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_raw(&self) -> Result<String, BinError> {
        fs::read_to_string(&self.path)
            .await
            .map_err(|e| BinError::Storage(format!("Failed to read lines file: {e}")))
    }

    async fn read_records(&self) -> Result<Vec<String>, BinError> {
        let contents = self.read_raw().await?;
        let records: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        debug!(
            target: "grumpybin.store.file",
            count = records.len(),
            "Read lines file"
        );

        Ok(records)
    }

    async fn write_records(&self, records: &[String]) -> Result<(), BinError> {
        let mut contents = String::with_capacity(records.iter().map(|r| r.len() + 1).sum());
        for record in records {
            contents.push_str(record);
            contents.push('\n');
        }

        fs::write(&self.path, contents)
            .await
            .map_err(|e| BinError::Storage(format!("Failed to write lines file: {e}")))
    }

    fn position_of(records: &[String], key: i64) -> Result<usize, BinError> {
        records
            .iter()
            .position(|record| record_key(record) == Some(key))
            .ok_or(BinError::KeyNotFound(key))
    }
}

#[async_trait]
impl LineStore for FileLineStore {
    fn kind(&self) -> StorageBackendKind {
        StorageBackendKind::File
    }

    #[instrument(skip_all, name = "grumpybin.store.file.add")]
    async fn add(&self, text: &str) -> Result<i64, BinError> {
        let contents = self.read_raw().await?;

        let last_key = match contents.lines().map(str::trim).rfind(|l| !l.is_empty()) {
            Some(last) => Some(record_key(last).ok_or_else(|| {
                BinError::Corrupt(format!("last record has no numeric key: '{last}'"))
            })?),
            None => None,
        };
        let key = next_key(last_key)?;

        let mut record = String::new();
        // Keep one record per line even if the file was edited by hand
        if !contents.is_empty() && !contents.ends_with('\n') {
            record.push('\n');
        }
        record.push_str(&format_record(key, &normalize_text(text)));
        record.push('\n');

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| BinError::Storage(format!("Failed to open lines file: {e}")))?;
        file.write_all(record.as_bytes())
            .await
            .map_err(|e| BinError::Storage(format!("Failed to append line: {e}")))?;
        file.flush()
            .await
            .map_err(|e| BinError::Storage(format!("Failed to append line: {e}")))?;

        Ok(key)
    }

    #[instrument(skip_all, name = "grumpybin.store.file.modify", fields(key = key))]
    async fn modify(&self, key: i64, text: &str) -> Result<i64, BinError> {
        let mut records = self.read_records().await?;
        let position = Self::position_of(&records, key)?;

        if let Some(record) = records.get_mut(position) {
            *record = format_record(key, &normalize_text(text));
        }

        self.write_records(&records).await?;
        Ok(key)
    }

    #[instrument(skip_all, name = "grumpybin.store.file.delete", fields(key = key))]
    async fn delete(&self, key: i64) -> Result<i64, BinError> {
        let mut records = self.read_records().await?;
        let position = Self::position_of(&records, key)?;

        records.remove(position);

        self.write_records(&records).await?;
        Ok(key)
    }

    #[instrument(skip_all, name = "grumpybin.store.file.list")]
    async fn list(&self) -> Result<Vec<String>, BinError> {
        self.read_records().await
    }
}
