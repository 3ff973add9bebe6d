// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed load/save of the four persisted records on top of any
//! [`StorageAdapter`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use persona_config::Settings;
use persona_core::{Character, Conversations, PersonaError, RecordKey, StorageAdapter, UnreadCounts};

/// Everything the chat engine persists.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub settings: Settings,
    pub characters: Vec<Character>,
    pub messages: Conversations,
    pub unread_counts: UnreadCounts,
}

impl PersistedState {
    /// Normalizes sliders and gives every character a message list.
    pub fn normalized(mut self) -> Self {
        self.characters = self
            .characters
            .into_iter()
            .map(Character::normalized)
            .collect();
        for character in &self.characters {
            self.messages.entry(character.conversation_key()).or_default();
        }
        self
    }
}

/// Loads the persisted state.
///
/// `seed` is used when no settings record exists yet. A record that cannot
/// be decoded is logged and replaced by its default; only backend failures
/// are returned as errors.
pub async fn load_snapshot(
    storage: &dyn StorageAdapter,
    seed: Settings,
) -> Result<PersistedState, PersonaError> {
    let settings = match storage.get_record(RecordKey::Settings).await? {
        Some(value) => decode_or_default(RecordKey::Settings, value),
        None => {
            info!("no stored settings, seeding from configuration");
            seed
        }
    };

    let state = PersistedState {
        settings,
        characters: load(storage, RecordKey::Characters).await?,
        messages: load(storage, RecordKey::Messages).await?,
        unread_counts: load(storage, RecordKey::UnreadCounts).await?,
    };

    Ok(state.normalized())
}

/// Writes the whole state, one record at a time.
pub async fn save_snapshot(
    storage: &dyn StorageAdapter,
    state: &PersistedState,
) -> Result<(), PersonaError> {
    save_settings(storage, &state.settings).await?;
    save_characters(storage, &state.characters).await?;
    save_messages(storage, &state.messages).await?;
    save_unread_counts(storage, &state.unread_counts).await
}

pub async fn save_settings(
    storage: &dyn StorageAdapter,
    settings: &Settings,
) -> Result<(), PersonaError> {
    save(storage, RecordKey::Settings, settings).await
}

pub async fn save_characters(
    storage: &dyn StorageAdapter,
    characters: &[Character],
) -> Result<(), PersonaError> {
    save(storage, RecordKey::Characters, characters).await
}

pub async fn save_messages(
    storage: &dyn StorageAdapter,
    messages: &Conversations,
) -> Result<(), PersonaError> {
    save(storage, RecordKey::Messages, messages).await
}

pub async fn save_unread_counts(
    storage: &dyn StorageAdapter,
    unread: &UnreadCounts,
) -> Result<(), PersonaError> {
    save(storage, RecordKey::UnreadCounts, unread).await
}

async fn load<T>(storage: &dyn StorageAdapter, key: RecordKey) -> Result<T, PersonaError>
where
    T: DeserializeOwned + Default,
{
    Ok(storage
        .get_record(key)
        .await?
        .map(|value| decode_or_default(key, value))
        .unwrap_or_default())
}

fn decode_or_default<T>(key: RecordKey, value: serde_json::Value) -> T
where
    T: DeserializeOwned + Default,
{
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(key = key.as_str(), error = %e, "stored record is corrupt, using default");
        T::default()
    })
}

async fn save<T>(storage: &dyn StorageAdapter, key: RecordKey, value: &T) -> Result<(), PersonaError>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(value).map_err(PersonaError::storage)?;
    storage.put_record(key, value).await
}
