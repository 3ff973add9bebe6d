// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a temp SQLite record store, a mock provider and
//! a configuration pointing at them, with an optional seeded state already
//! written to the database.

use std::sync::Arc;

use persona_config::PersonaConfig;
use persona_config::model::StorageConfig;
use persona_core::{Character, PersonaError, StorageAdapter};
use persona_storage::{PersistedState, SqliteStorage, save_snapshot};

use crate::fixtures;
use crate::mock_provider::MockProvider;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    characters: Vec<Character>,
    seed_settings: bool,
    provider: MockProvider,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            characters: Vec::new(),
            seed_settings: true,
            provider: MockProvider::new(),
        }
    }

    /// Store these characters (each with an empty conversation).
    pub fn with_characters(mut self, characters: Vec<Character>) -> Self {
        self.characters = characters;
        self
    }

    /// Leave the database empty, as on a first run.
    pub fn empty(mut self) -> Self {
        self.seed_settings = false;
        self.characters.clear();
        self
    }

    /// Use a pre-configured provider.
    pub fn with_provider(mut self, provider: MockProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Build the test harness, creating the database and seeding it.
    pub async fn build(self) -> Result<TestHarness, PersonaError> {
        let temp_dir = tempfile::TempDir::new().map_err(PersonaError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = PersonaConfig::default();
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        config.scheduler.tick_secs = 60;

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;

        if self.seed_settings {
            let state = fixtures::persisted(fixtures::settings(), self.characters);
            save_snapshot(&storage, &state).await?;
        }

        Ok(TestHarness {
            config,
            storage: Arc::new(storage),
            provider: self.provider,
            _temp_dir: temp_dir,
        })
    }
}

/// A temp database plus a mock provider.
///
/// The database lives as long as the harness.
pub struct TestHarness {
    pub config: PersonaConfig,
    pub storage: Arc<SqliteStorage>,
    pub provider: MockProvider,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The storage as a trait object.
    pub fn storage_adapter(&self) -> Arc<dyn StorageAdapter + Send + Sync> {
        self.storage.clone()
    }

    /// The provider as a trait object sharing queues with `self.provider`.
    pub fn provider_adapter(&self) -> Arc<dyn persona_core::GenerationProvider + Send + Sync> {
        Arc::new(self.provider.clone())
    }

    /// Reads back what is currently stored.
    pub async fn stored_state(&self) -> Result<PersistedState, PersonaError> {
        persona_storage::load_snapshot(self.storage.as_ref(), Default::default()).await
    }
}
