// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `persona backup`, `persona restore` and `persona prompts` commands.
//!
//! Backups are JSON documents holding the four state records. Restoring
//! first writes the current state next to the target file with a
//! `.pre-restore` suffix.

use std::path::{Path, PathBuf};

use persona_config::Settings;
use persona_core::{PersonaError, StorageAdapter};
use persona_storage::{
    export_backup, export_prompts, import_prompts, load_snapshot, parse_backup, save_settings,
    save_snapshot,
};

/// Writes the stored state to `path` as a backup document.
pub async fn run_backup(storage: &dyn StorageAdapter, path: &Path) -> Result<(), PersonaError> {
    let state = load_snapshot(storage, Settings::default()).await?;
    let document = export_backup(&state)?;
    tokio::fs::write(path, &document)
        .await
        .map_err(PersonaError::storage)?;

    let message_count: usize = state.messages.values().map(Vec::len).sum();
    eprintln!(
        "Backup complete: {} characters, {message_count} messages written to {}",
        state.characters.len(),
        path.display()
    );
    Ok(())
}

/// Replaces the stored state with the backup document at `path`.
///
/// The document is validated before anything is written.
pub async fn run_restore(storage: &dyn StorageAdapter, path: &Path) -> Result<(), PersonaError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(PersonaError::storage)?;
    let restored = parse_backup(&text)?;

    let safety = pre_restore_path(path);
    eprintln!("Creating safety backup: {}", safety.display());
    run_backup(storage, &safety).await?;

    save_snapshot(storage, &restored).await?;
    eprintln!(
        "Restore complete: {} characters restored from {}",
        restored.characters.len(),
        path.display()
    );
    Ok(())
}

/// Writes the prompt templates to `path`.
pub async fn run_prompts_export(
    storage: &dyn StorageAdapter,
    path: &Path,
) -> Result<(), PersonaError> {
    let settings = load_snapshot(storage, Settings::default()).await?.settings;
    let document = export_prompts(&settings.prompts)?;
    tokio::fs::write(path, document)
        .await
        .map_err(PersonaError::storage)?;
    eprintln!("Prompts written to {}", path.display());
    Ok(())
}

/// Replaces the prompt templates with the document at `path`. Missing
/// sections fall back to the built-in defaults.
pub async fn run_prompts_import(
    storage: &dyn StorageAdapter,
    path: &Path,
) -> Result<(), PersonaError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(PersonaError::storage)?;
    let prompts = import_prompts(&text)?;

    let mut settings = load_snapshot(storage, Settings::default()).await?.settings;
    settings.prompts = prompts;
    save_settings(storage, &settings).await?;
    eprintln!("Prompts imported from {}", path.display());
    Ok(())
}

fn pre_restore_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".pre-restore");
    PathBuf::from(name)
}
