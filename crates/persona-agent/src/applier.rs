// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Paced reveal of generated replies.
//!
//! A reply goes through three phases per conversation:
//! Waiting (reaction delay) -> Revealing (one message per delay) -> Idle.
//! Every message append is a single store dispatch, so a renderer never
//! observes a half-applied message. Navigation does not interrupt a reveal;
//! only the shutdown token does.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use persona_core::{ConversationKey, GenerationOutcome, Message, PendingResponse};

use crate::store::{Action, RevealPhase, Store};

/// Shown when the provider returned neither a reply nor an error text.
pub const GENERIC_ERROR: &str = "No reply was received. Please try again.";

/// What a reveal did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyReport {
    /// Character messages appended (text and sticker messages both count).
    pub delivered: usize,
    /// Error text, when an error-flagged message was appended instead.
    pub error: Option<String>,
    /// The reveal stopped early (shutdown, or the character disappeared).
    pub interrupted: bool,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.interrupted && self.delivered > 0
    }
}

/// Sequences a generation outcome into a store.
#[derive(Clone)]
pub struct ResponseApplier {
    store: Store,
}

impl ResponseApplier {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Applies `outcome` to the conversation `key`.
    pub async fn apply(
        &self,
        key: &ConversationKey,
        outcome: GenerationOutcome,
        cancel: &CancellationToken,
    ) -> ApplyReport {
        match outcome {
            GenerationOutcome::Reply(reply) if !reply.messages.is_empty() => {
                self.reveal(key, reply, cancel).await
            }
            GenerationOutcome::Reply(_) => self.fail(key, GENERIC_ERROR),
            GenerationOutcome::Error(message) => {
                let message = message.trim();
                self.fail(key, if message.is_empty() { GENERIC_ERROR } else { message })
            }
        }
    }

    async fn reveal(
        &self,
        key: &ConversationKey,
        reply: PendingResponse,
        cancel: &CancellationToken,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();

        let Some(character) = self.store.state().character_for(key).cloned() else {
            warn!(conversation = %key, "reply for unknown character dropped");
            self.store.dispatch(Action::SetAwaitingResponse(false));
            report.interrupted = true;
            return report;
        };

        if let Some(memory) = reply.memory_to_store() {
            debug!(character = %character.id, "storing new memory");
            self.store.dispatch(Action::AppendMemory {
                id: character.id.clone(),
                memory: memory.to_string(),
            });
        }

        self.set_phase(key, RevealPhase::Waiting);
        if !pause(reply.reaction_delay, cancel).await {
            self.finish(key);
            report.interrupted = true;
            return report;
        }

        self.store.dispatch(Action::SetTyping {
            key: key.clone(),
            typing: true,
        });
        self.store.dispatch(Action::SetAwaitingResponse(false));
        self.set_phase(key, RevealPhase::Revealing);

        for entry in &reply.messages {
            if !pause(entry.delay, cancel).await {
                report.interrupted = true;
                break;
            }

            // Re-read: the character may have been edited or deleted meanwhile.
            let state = self.store.state();
            let Some(current) = state.character_for(key) else {
                info!(conversation = %key, "character removed during reveal");
                report.interrupted = true;
                break;
            };

            let now = Utc::now();
            let content = entry.content.trim();
            if !content.is_empty() {
                self.deliver(key, Message::from_character(&current.name, content, now));
                report.delivered += 1;
            }

            if let Some(reference) = entry.sticker.as_deref() {
                match current.sticker(reference) {
                    Some(item) => {
                        self.deliver(key, Message::character_sticker(&current.name, &item.id, now));
                        report.delivered += 1;
                    }
                    None => debug!(sticker = reference, "reply named an unknown sticker"),
                }
            }
        }

        self.finish(key);
        debug!(
            conversation = %key,
            delivered = report.delivered,
            interrupted = report.interrupted,
            "reveal finished"
        );
        report
    }

    fn fail(&self, key: &ConversationKey, message: &str) -> ApplyReport {
        warn!(conversation = %key, error = message, "generation failed");
        let state = self.store.state();
        let Some(character) = state.character_for(key) else {
            warn!(conversation = %key, "error for unknown character dropped");
            self.store.dispatch(Action::SetAwaitingResponse(false));
            return ApplyReport {
                delivered: 0,
                error: Some(message.to_string()),
                interrupted: true,
            };
        };
        self.deliver(key, Message::error(&character.name, message, Utc::now()));
        self.finish(key);
        ApplyReport {
            delivered: 0,
            error: Some(message.to_string()),
            interrupted: false,
        }
    }

    fn deliver(&self, key: &ConversationKey, message: Message) {
        self.store.dispatch(Action::DeliverMessage {
            key: key.clone(),
            message,
        });
    }

    fn set_phase(&self, key: &ConversationKey, phase: RevealPhase) {
        self.store.dispatch(Action::SetRevealPhase {
            key: key.clone(),
            phase,
        });
    }

    fn finish(&self, key: &ConversationKey) {
        self.store.dispatch(Action::SetTyping {
            key: key.clone(),
            typing: false,
        });
        self.store.dispatch(Action::SetAwaitingResponse(false));
        self.set_phase(key, RevealPhase::Idle);
    }
}

/// Sleeps for `millis`; false if cancelled first.
async fn pause(millis: u64, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if millis == 0 {
        return true;
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(Duration::from_millis(millis)) => true,
    }
}
