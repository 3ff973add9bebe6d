// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation runtime for Persona Chat.
//!
//! The [`Engine`] owns the application state and coordinates:
//! - user messages and their paced replies ([`chat`])
//! - proactive messages and random first contacts ([`scheduler`])
//! - write-behind persistence of the state records ([`persist`])
//! - graceful shutdown ([`shutdown`])
//!
//! At most one response cycle runs at a time across all of them; see
//! [`gate`].

pub mod applier;
pub mod chat;
pub mod context;
pub mod cycle;
pub mod gate;
pub mod persist;
pub mod scheduler;
pub mod shutdown;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use persona_config::{PersonaConfig, Settings};
use persona_core::{GenerationProvider, PersonaError, StorageAdapter};
use persona_storage::{load_snapshot, save_settings};

pub use applier::{ApplyReport, ResponseApplier};
pub use chat::{CharacterDraft, ChatService};
pub use context::CycleOptions;
pub use cycle::CycleRunner;
pub use gate::{GateGuard, ResponseGate};
pub use scheduler::{ProactiveScheduler, TickOutcome};
pub use store::{Action, AppState, RevealPhase, StateChange, Store};

/// Runtime knobs taken from the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentOptions {
    /// Period of the proactive scheduler.
    pub tick: Duration,
    /// User messages after which a memory summary is requested.
    pub summary_interval: u32,
    /// Largest accepted decoded image size.
    pub max_upload_bytes: usize,
}

impl AgentOptions {
    pub fn from_config(config: &PersonaConfig) -> Self {
        Self {
            tick: Duration::from_secs(config.scheduler.tick_secs.max(1)),
            summary_interval: config.memory.summary_interval.max(1),
            max_upload_bytes: config.limits.max_upload_bytes,
        }
    }
}

/// The running conversation engine.
pub struct Engine {
    runner: Arc<CycleRunner>,
    scheduler: Arc<ProactiveScheduler>,
    chat: ChatService,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Loads the stored state and starts the background tasks.
    ///
    /// `storage` must already be initialized. Background tasks stop when
    /// `cancel` fires or [`shutdown`](Self::shutdown) is called.
    pub async fn start(
        config: &PersonaConfig,
        provider: Arc<dyn GenerationProvider + Send + Sync>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        cancel: CancellationToken,
    ) -> Result<Self, PersonaError> {
        let options = AgentOptions::from_config(config);
        // Config only seeds settings on first run; stored settings win.
        let persisted = load_snapshot(storage.as_ref(), Settings::seeded_from(config)).await?;
        save_settings(storage.as_ref(), &persisted.settings).await?;

        info!(
            characters = persisted.characters.len(),
            conversations = persisted.messages.len(),
            api_key = persisted.settings.has_api_key(),
            "state loaded"
        );

        let store = Store::new(AppState::from_persisted(persisted));
        let runner = Arc::new(CycleRunner::new(store.clone(), provider, cancel.clone()));
        let scheduler = Arc::new(ProactiveScheduler::new(Arc::clone(&runner), options.tick));
        let chat = ChatService::new(Arc::clone(&runner), Arc::clone(&scheduler), options);

        let tasks = vec![
            persist::spawn_persistence(store, Arc::clone(&storage), cancel),
            tokio::spawn(Arc::clone(&scheduler).run()),
        ];
        scheduler.schedule_random_characters();

        Ok(Self {
            runner,
            scheduler,
            chat,
            storage,
            tasks,
        })
    }

    pub fn store(&self) -> &Store {
        self.runner.store()
    }

    pub fn chat(&self) -> &ChatService {
        &self.chat
    }

    pub fn scheduler(&self) -> &Arc<ProactiveScheduler> {
        &self.scheduler
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        self.runner.cancel_token()
    }

    /// Stops the engine: interrupts pending reveals, waits for the active
    /// cycle up to `drain_timeout`, flushes state and closes storage.
    pub async fn shutdown(self, drain_timeout: Duration) -> Result<(), PersonaError> {
        info!("engine shutting down");
        self.runner.cancel_token().cancel();

        shutdown::drain_cycles(self.runner.gate(), drain_timeout).await;
        self.scheduler.wait_for_timers().await;
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "background task failed");
            }
        }

        self.storage.close().await?;
        info!("engine stopped");
        Ok(())
    }
}
