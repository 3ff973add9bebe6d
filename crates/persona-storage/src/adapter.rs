// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};
use tokio::sync::OnceCell;
use tracing::debug;

use persona_config::model::StorageConfig;
use persona_core::{
    AdapterType, HealthStatus, PersonaError, PluginAdapter, RecordKey, StorageAdapter,
};

use crate::database::{Database, map_tr_err};

/// SQLite-backed record store.
///
/// The database is lazily opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wraps an already opened database.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    fn db(&self) -> Result<&Database, PersonaError> {
        self.db.get().ok_or_else(|| PersonaError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(&self) -> Result<(), PersonaError> {
        if !self.config.wal_mode {
            return Ok(());
        }
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |_| Ok(()))?;
                    Ok(())
                })
                .await
                .map_err(map_tr_err)?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, PersonaError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("storage not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PersonaError> {
        self.checkpoint().await
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), PersonaError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| PersonaError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), PersonaError> {
        self.db()?;
        self.checkpoint().await
    }

    async fn get_record(&self, key: RecordKey) -> Result<Option<serde_json::Value>, PersonaError> {
        let raw = self
            .db()?
            .connection()
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                conn.query_row(
                    "SELECT value FROM records WHERE key = ?1",
                    params![key.as_str()],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)?;

        raw.map(|text| serde_json::from_str(&text).map_err(PersonaError::storage))
            .transpose()
    }

    async fn put_record(&self, key: RecordKey, value: serde_json::Value) -> Result<(), PersonaError> {
        let text = serde_json::to_string(&value).map_err(PersonaError::storage)?;
        let updated_at = chrono::Utc::now().to_rfc3339();
        let len = text.len();
        self.db()?
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO records (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key.as_str(), text, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!(key = key.as_str(), bytes = len, "record written");
        Ok(())
    }
}
