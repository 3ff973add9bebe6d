// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the persisted key-value records.

use async_trait::async_trait;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::PersonaError;
use crate::traits::adapter::PluginAdapter;

/// The fixed keys under which application state is persisted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum RecordKey {
    Settings,
    Characters,
    Messages,
    UnreadCounts,
}

impl RecordKey {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Adapter for a key-value persistence backend.
///
/// Each record is a whole JSON document replaced on every write.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), PersonaError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), PersonaError>;

    /// Reads a record, or `None` if it was never written.
    async fn get_record(&self, key: RecordKey) -> Result<Option<serde_json::Value>, PersonaError>;

    /// Replaces a record.
    async fn put_record(&self, key: RecordKey, value: serde_json::Value) -> Result<(), PersonaError>;
}
