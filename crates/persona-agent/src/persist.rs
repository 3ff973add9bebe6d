// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write-behind persistence of the state records.
//!
//! A background task follows the store's change feed and rewrites the
//! records that changed. Bursts of changes are coalesced into one write per
//! record. Write failures are logged and never stop the task.

use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use persona_core::{PersonaError, StorageAdapter};
use persona_storage::{save_characters, save_messages, save_settings, save_unread_counts};

use crate::store::{StateChange, Store};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Dirty {
    settings: bool,
    characters: bool,
    messages: bool,
    unread: bool,
}

impl Dirty {
    fn all() -> Self {
        Self {
            settings: true,
            characters: true,
            messages: true,
            unread: true,
        }
    }

    fn mark(&mut self, change: &StateChange) {
        match change {
            StateChange::Settings => self.settings = true,
            StateChange::Characters => self.characters = true,
            StateChange::Messages(_) => self.messages = true,
            StateChange::Unread => self.unread = true,
            StateChange::Selection | StateChange::Ui => {}
        }
    }

    fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Spawns the persistence task.
///
/// The task subscribes before returning, so every change dispatched after
/// this call is persisted. When `cancel` fires it writes every record one
/// last time and exits.
pub fn spawn_persistence(
    store: Store,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut changes = store.subscribe();

    tokio::spawn(async move {
        info!(storage = storage.name(), "persistence task started");
        loop {
            let mut dirty = Dirty::default();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = changes.recv() => match received {
                    Ok(change) => dirty.mark(&change),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "persistence fell behind, rewriting all records");
                        dirty = Dirty::all();
                    }
                    Err(RecvError::Closed) => break,
                },
            }

            loop {
                match changes.try_recv() {
                    Ok(change) => dirty.mark(&change),
                    Err(TryRecvError::Lagged(_)) => dirty = Dirty::all(),
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }

            if !dirty.is_clean() {
                flush(&store, storage.as_ref(), dirty).await;
            }
        }

        flush(&store, storage.as_ref(), Dirty::all()).await;
        info!("persistence task stopped");
    })
}

async fn flush(store: &Store, storage: &(dyn StorageAdapter + Send + Sync), dirty: Dirty) {
    let state = store.state();
    debug!(?dirty, "persisting state");

    if dirty.settings {
        report("settings", save_settings(storage, &state.settings).await);
    }
    if dirty.characters {
        report("characters", save_characters(storage, &state.characters).await);
    }
    if dirty.messages {
        report("messages", save_messages(storage, &state.conversations).await);
    }
    if dirty.unread {
        report("unreadCounts", save_unread_counts(storage, &state.unread).await);
    }
}

fn report(record: &str, result: Result<(), PersonaError>) {
    if let Err(e) = result {
        warn!(record, error = %e, "failed to persist record");
    }
}
