// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock generation provider for deterministic testing.
//!
//! `MockProvider` implements `GenerationProvider` with pre-configured
//! outcomes and records every request it receives, enabling fast,
//! CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use persona_core::PersonaError;
use persona_core::traits::adapter::PluginAdapter;
use persona_core::traits::provider::GenerationProvider;
use persona_core::types::{
    AdapterType, GeneratedProfile, GenerationOutcome, GenerationRequest, HealthStatus,
    PendingResponse, ProfileOutcome, ProfileRequest, ResponseMessage,
};

/// Text of the reply returned when the content queue is empty.
pub const DEFAULT_REPLY: &str = "mock reply";

/// A mock provider that returns pre-configured outcomes.
///
/// Outcomes are popped from FIFO queues. When a queue is empty a default
/// one-message reply (or a default profile) is returned. Clones share
/// queues and captured requests.
#[derive(Clone, Default)]
pub struct MockProvider {
    replies: Arc<Mutex<VecDeque<GenerationOutcome>>>,
    profiles: Arc<Mutex<VecDeque<ProfileOutcome>>>,
    content_requests: Arc<Mutex<Vec<GenerationRequest>>>,
    profile_requests: Arc<Mutex<Vec<ProfileRequest>>>,
    latency: Option<Duration>,
}

impl MockProvider {
    /// Create a new mock provider with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock provider pre-loaded with the given content outcomes.
    pub fn with_outcomes(outcomes: Vec<GenerationOutcome>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(outcomes))),
            ..Self::default()
        }
    }

    /// Every call sleeps for `latency` (on the tokio clock) before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a content outcome.
    pub async fn push_outcome(&self, outcome: GenerationOutcome) {
        self.replies.lock().await.push_back(outcome);
    }

    /// Queue a reply made of plain text messages with no delays.
    pub async fn push_reply(&self, texts: &[&str]) {
        self.push_outcome(GenerationOutcome::Reply(reply(texts))).await;
    }

    /// Queue a provider error.
    pub async fn push_error(&self, message: &str) {
        self.push_outcome(GenerationOutcome::Error(message.to_string()))
            .await;
    }

    /// Queue a profile outcome.
    pub async fn push_profile(&self, outcome: ProfileOutcome) {
        self.profiles.lock().await.push_back(outcome);
    }

    /// Content requests received so far, oldest first.
    pub async fn content_requests(&self) -> Vec<GenerationRequest> {
        self.content_requests.lock().await.clone()
    }

    /// Profile requests received so far, oldest first.
    pub async fn profile_requests(&self) -> Vec<ProfileRequest> {
        self.profile_requests.lock().await.clone()
    }

    /// Total number of provider calls of either kind.
    pub async fn call_count(&self) -> usize {
        self.content_requests.lock().await.len() + self.profile_requests.lock().await.len()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

/// Builds a reply of undelayed text messages.
pub fn reply(texts: &[&str]) -> PendingResponse {
    PendingResponse {
        reaction_delay: 0,
        messages: texts
            .iter()
            .map(|t| ResponseMessage {
                delay: 0,
                content: (*t).to_string(),
                sticker: None,
            })
            .collect(),
        new_memory: None,
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, PersonaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PersonaError> {
        Ok(())
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate_content(&self, request: &GenerationRequest) -> GenerationOutcome {
        self.content_requests.lock().await.push(request.clone());
        self.pause().await;
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| GenerationOutcome::Reply(reply(&[DEFAULT_REPLY])))
    }

    async fn generate_profile(&self, request: &ProfileRequest) -> ProfileOutcome {
        self.profile_requests.lock().await.push(request.clone());
        self.pause().await;
        self.profiles.lock().await.pop_front().unwrap_or_else(|| {
            ProfileOutcome::Profile(GeneratedProfile {
                name: "Mock Persona".to_string(),
                prompt: "A persona invented for tests.".to_string(),
            })
        })
    }
}
