// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One response cycle: assemble the request, call the provider, reveal the
//! outcome.
//!
//! The caller holds the [`ResponseGate`](crate::gate::ResponseGate) for the
//! whole cycle; [`CycleRunner`] does not acquire it.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use persona_core::{ConversationKey, GenerationProvider, PersonaError};

use crate::applier::{ApplyReport, ResponseApplier};
use crate::context::{CycleOptions, assemble_request};
use crate::gate::ResponseGate;
use crate::store::{Action, Store};

/// Shared runtime of the agent: state, gate, provider and shutdown token.
pub struct CycleRunner {
    store: Store,
    gate: ResponseGate,
    provider: Arc<dyn GenerationProvider + Send + Sync>,
    cancel: CancellationToken,
}

impl CycleRunner {
    pub fn new(
        store: Store,
        provider: Arc<dyn GenerationProvider + Send + Sync>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            gate: ResponseGate::new(),
            provider,
            cancel,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn gate(&self) -> &ResponseGate {
        &self.gate
    }

    pub fn provider(&self) -> &Arc<dyn GenerationProvider + Send + Sync> {
        &self.provider
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs a cycle against the main store.
    pub async fn run(
        &self,
        key: &ConversationKey,
        options: CycleOptions,
    ) -> Result<ApplyReport, PersonaError> {
        self.run_on(&self.store, key, options).await
    }

    /// Runs a cycle against `target`, which may be a detached store.
    pub async fn run_on(
        &self,
        target: &Store,
        key: &ConversationKey,
        options: CycleOptions,
    ) -> Result<ApplyReport, PersonaError> {
        let request = assemble_request(&target.state(), key, options, Utc::now())?;

        if !options.is_proactive {
            target.dispatch(Action::SetAwaitingResponse(true));
        }

        debug!(conversation = %key, model = %request.model, "calling provider");
        let outcome = self.provider.generate_content(&request).await;

        let report = ResponseApplier::new(target.clone())
            .apply(key, outcome, &self.cancel)
            .await;
        info!(
            conversation = %key,
            proactive = options.is_proactive,
            delivered = report.delivered,
            failed = report.error.is_some(),
            "response cycle complete"
        );
        Ok(report)
    }
}
