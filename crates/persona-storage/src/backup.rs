// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backup and prompt-backup documents.
//!
//! A full backup is a JSON object with exactly the four persisted records:
//!
//! ```json
//! { "settings": {...}, "characters": [...], "messages": {...}, "unreadCounts": {...} }
//! ```
//!
//! A prompt backup is the [`PromptTemplates`] document on its own. Prompt
//! restores are lenient (missing sections fall back to the built-in texts);
//! full restores are strict about the top-level keys.

use serde::{Deserialize, Serialize};
use tracing::debug;

use persona_config::{PromptTemplates, Settings};
use persona_core::{Character, Conversations, PersonaError, UnreadCounts};

use crate::snapshot::PersistedState;

/// Top-level keys every backup document must carry.
pub const BACKUP_KEYS: [&str; 4] = ["settings", "characters", "messages", "unreadCounts"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupRef<'a> {
    settings: &'a Settings,
    characters: &'a [Character],
    messages: &'a Conversations,
    unread_counts: &'a UnreadCounts,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupDocument {
    settings: Settings,
    characters: Vec<Character>,
    messages: Conversations,
    unread_counts: UnreadCounts,
}

/// Serializes the state as a pretty-printed backup document.
pub fn export_backup(state: &PersistedState) -> Result<String, PersonaError> {
    let doc = BackupRef {
        settings: &state.settings,
        characters: &state.characters,
        messages: &state.messages,
        unread_counts: &state.unread_counts,
    };
    serde_json::to_string_pretty(&doc).map_err(|e| PersonaError::Internal(e.to_string()))
}

/// Parses a backup document.
///
/// Fails with [`PersonaError::InvalidBackup`] when the text is not a JSON
/// object, when any of [`BACKUP_KEYS`] is absent, or when a record has the
/// wrong shape.
pub fn parse_backup(text: &str) -> Result<PersistedState, PersonaError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| PersonaError::InvalidBackup(format!("not valid JSON: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| PersonaError::InvalidBackup("document is not a JSON object".into()))?;

    let missing: Vec<&str> = BACKUP_KEYS
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(PersonaError::InvalidBackup(format!(
            "missing required keys: {}",
            missing.join(", ")
        )));
    }

    let doc: BackupDocument = serde_json::from_value(value)
        .map_err(|e| PersonaError::InvalidBackup(e.to_string()))?;
    debug!(
        characters = doc.characters.len(),
        conversations = doc.messages.len(),
        "backup document parsed"
    );

    Ok(PersistedState {
        settings: doc.settings,
        characters: doc.characters,
        messages: doc.messages,
        unread_counts: doc.unread_counts,
    }
    .normalized())
}

/// Serializes prompt templates as a prompt backup document.
pub fn export_prompts(templates: &PromptTemplates) -> Result<String, PersonaError> {
    serde_json::to_string_pretty(templates).map_err(|e| PersonaError::Internal(e.to_string()))
}

/// Parses a prompt backup document, filling absent sections with defaults.
pub fn import_prompts(text: &str) -> Result<PromptTemplates, PersonaError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| PersonaError::InvalidBackup(format!("not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(PersonaError::InvalidBackup(
            "prompt document is not a JSON object".into(),
        ));
    }
    serde_json::from_value(value).map_err(|e| PersonaError::InvalidBackup(e.to_string()))
}
