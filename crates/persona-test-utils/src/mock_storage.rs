// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage adapter for deterministic testing.
//!
//! `MemoryStorage` implements `StorageAdapter` over a map and records every
//! write so tests can assert what the persistence subscriber stored.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use persona_core::PersonaError;
use persona_core::traits::adapter::PluginAdapter;
use persona_core::traits::storage::{RecordKey, StorageAdapter};
use persona_core::types::{AdapterType, HealthStatus};

/// A map-backed record store.
///
/// Clones share the same records. Writes can be made to fail with
/// [`MemoryStorage::fail_writes`] to exercise error paths.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    records: Arc<Mutex<HashMap<RecordKey, serde_json::Value>>>,
    writes: Arc<Mutex<Vec<RecordKey>>>,
    notify: Arc<Notify>,
    failing: Arc<AtomicBool>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put_record` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    /// Current value of a record.
    pub async fn record(&self, key: RecordKey) -> Option<serde_json::Value> {
        self.records.lock().await.get(&key).cloned()
    }

    /// Keys written so far, in write order.
    pub async fn writes(&self) -> Vec<RecordKey> {
        self.writes.lock().await.clone()
    }

    /// Waits until at least `count` successful writes have happened.
    pub async fn wait_for_writes(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.writes.lock().await.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl PluginAdapter for MemoryStorage {
    fn name(&self) -> &str {
        "memory-storage"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, PersonaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PersonaError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn initialize(&self) -> Result<(), PersonaError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), PersonaError> {
        Ok(())
    }

    async fn get_record(&self, key: RecordKey) -> Result<Option<serde_json::Value>, PersonaError> {
        Ok(self.record(key).await)
    }

    async fn put_record(&self, key: RecordKey, value: serde_json::Value) -> Result<(), PersonaError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersonaError::storage(std::io::Error::other(
                "simulated write failure",
            )));
        }
        self.records.lock().await.insert(key, value);
        self.writes.lock().await.push(key);
        self.notify.notify_waiters();
        Ok(())
    }
}
