//! Postgres-backed line store.
//!
//! One row per line in the `lines` table. `position` (BIGSERIAL) preserves
//! append order, `line_key` is the operator-facing key. Key assignment reads
//! the last row and inserts in one transaction under an exclusive table lock,
//! so two processes sharing the database cannot hand out the same key.
//!
//! All queries use parameterized statements.

use super::{format_record, next_key, normalize_text, LineStore};
use crate::config::StorageBackendKind;
use crate::errors::BinError;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{error, info, instrument};

/// Maximum pooled connections; the store actor issues one query at a time.
const MAX_CONNECTIONS: u32 = 2;

/// Timeout for acquiring a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Line store persisted in Postgres.
#[derive(Debug, Clone)]
pub struct PostgresLineStore {
    pool: PgPool,
}

impl PostgresLineStore {
    /// Connect to the database and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns `BinError::Database` if the connection or a migration fails.
    pub async fn connect(database_url: &str) -> Result<Self, BinError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(|e| {
                // Note: Do NOT log database_url as it contains credentials
                error!(
                    target: "grumpybin.store.postgres",
                    error = %e,
                    "Failed to connect to database"
                );
                BinError::Database(format!("Failed to connect to database: {e}"))
            })?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                error!(
                    target: "grumpybin.store.postgres",
                    error = %e,
                    "Failed to run migrations"
                );
                BinError::Database(format!("Failed to run migrations: {e}"))
            })?;

        info!(target: "grumpybin.store.postgres", "Database connection established");

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool (schema must already be migrated).
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LineStore for PostgresLineStore {
    fn kind(&self) -> StorageBackendKind {
        StorageBackendKind::Database
    }

    #[instrument(skip_all, name = "grumpybin.store.postgres.add")]
    async fn add(&self, text: &str) -> Result<i64, BinError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("LOCK TABLE lines IN EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let last_key: Option<i64> =
            sqlx::query_scalar("SELECT line_key FROM lines ORDER BY position DESC LIMIT 1")
                .fetch_optional(&mut *tx)
                .await?;
        let key = next_key(last_key)?;

        sqlx::query("INSERT INTO lines (line_key, text) VALUES ($1, $2)")
            .bind(key)
            .bind(normalize_text(text))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(key)
    }

    #[instrument(skip_all, name = "grumpybin.store.postgres.modify", fields(key = key))]
    async fn modify(&self, key: i64, text: &str) -> Result<i64, BinError> {
        let result =
            sqlx::query("UPDATE lines SET text = $2, updated_at = NOW() WHERE line_key = $1")
                .bind(key)
                .bind(normalize_text(text))
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(BinError::KeyNotFound(key));
        }

        Ok(key)
    }

    #[instrument(skip_all, name = "grumpybin.store.postgres.delete", fields(key = key))]
    async fn delete(&self, key: i64) -> Result<i64, BinError> {
        let result = sqlx::query("DELETE FROM lines WHERE line_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BinError::KeyNotFound(key));
        }

        Ok(key)
    }

    #[instrument(skip_all, name = "grumpybin.store.postgres.list")]
    async fn list(&self) -> Result<Vec<String>, BinError> {
        let rows = sqlx::query("SELECT line_key, text FROM lines ORDER BY position")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<String, BinError> {
                let key: i64 = row.try_get("line_key")?;
                let text: String = row.try_get("text")?;
                Ok(format_record(key, &text))
            })
            .collect()
    }
}
