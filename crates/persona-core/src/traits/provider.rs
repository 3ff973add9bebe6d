// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider trait for generative-language API integrations.

use async_trait::async_trait;

use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerationOutcome, GenerationRequest, ProfileOutcome, ProfileRequest};

/// Adapter for a generative-language API.
///
/// Both entry points are infallible by signature: transport failures,
/// provider rejections, blocked candidates, and malformed payloads are all
/// reported through the `Error` variant of the returned outcome.
#[async_trait]
pub trait GenerationProvider: PluginAdapter {
    /// Generates a paced character reply.
    async fn generate_content(&self, request: &GenerationRequest) -> GenerationOutcome;

    /// Invents a new character profile (name and persona prompt).
    async fn generate_profile(&self, request: &ProfileRequest) -> ProfileOutcome;
}
