// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and migrations.
//!
//! All statements run on tokio-rusqlite's single background thread, which
//! serializes writes. Do not open additional connections for writes.

use std::path::Path;

use persona_core::PersonaError;
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// Handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies PRAGMAs and
    /// runs pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, PersonaError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(PersonaError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(PersonaError::storage)?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        info!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Opens a private in-memory database with the schema applied.
    pub async fn open_in_memory() -> Result<Self, PersonaError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(PersonaError::storage)?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), PersonaError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
                if wal_mode {
                    // journal_mode returns a row, so it cannot go through execute_batch.
                    let mode: String =
                        conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
                    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
                    debug!(journal_mode = %mode, "journal mode set");
                }
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        let applied = self
            .conn
            .call(|conn| run_migrations(conn))
            .await
            .map_err(PersonaError::storage)?;
        if applied > 0 {
            info!(applied, "database migrations applied");
        }
        Ok(())
    }

    /// Returns the underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }
}

/// Maps a tokio-rusqlite error onto the storage error variant.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> PersonaError {
    PersonaError::storage(e)
}
