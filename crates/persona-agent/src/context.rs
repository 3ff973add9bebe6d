// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request assembly from a state snapshot.
//!
//! Reads the settings, character and history for a conversation and hands
//! them to the prompt builder. The resulting requests carry the API key and
//! model from the persisted settings.

use chrono::{DateTime, Utc};
use tracing::debug;

use persona_config::Settings;
use persona_core::{ConversationKey, GenerationRequest, PersonaError, ProfileRequest};
use persona_prompt::{PromptInput, build_profile_prompt, build_request};

use crate::store::AppState;

/// How a cycle was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleOptions {
    /// The character speaks first, without a new user message.
    pub is_proactive: bool,
    /// Ask the model to summarize the conversation into a memory.
    pub force_summary: bool,
}

impl CycleOptions {
    pub fn reply(force_summary: bool) -> Self {
        Self {
            is_proactive: false,
            force_summary,
        }
    }

    pub fn proactive() -> Self {
        Self {
            is_proactive: true,
            force_summary: false,
        }
    }
}

/// Builds the content-generation request for conversation `key`.
pub fn assemble_request(
    state: &AppState,
    key: &ConversationKey,
    options: CycleOptions,
    now: DateTime<Utc>,
) -> Result<GenerationRequest, PersonaError> {
    let character = state
        .character_for(key)
        .ok_or_else(|| PersonaError::NotFound {
            kind: "character",
            id: key.to_string(),
        })?;
    let settings = &state.settings;

    let input = PromptInput {
        user_name: &settings.user_name,
        user_description: &settings.user_description,
        character,
        history: state.history(key),
        templates: &settings.prompts,
        is_proactive: options.is_proactive,
        force_summary: options.force_summary,
    };
    let built = build_request(&input, now);
    debug!(
        conversation = %key,
        turns = built.contents.len(),
        system_prompt_len = built.system_prompt.len(),
        proactive = options.is_proactive,
        force_summary = options.force_summary,
        "request assembled"
    );

    Ok(GenerationRequest {
        api_key: settings.api_key.clone(),
        model: settings.model.clone(),
        contents: built.contents,
        system_prompt: built.system_prompt,
    })
}

/// Builds the profile-generation request for a new random character.
pub fn assemble_profile_request(settings: &Settings) -> ProfileRequest {
    ProfileRequest {
        api_key: settings.api_key.clone(),
        model: settings.model.clone(),
        prompt: build_profile_prompt(
            &settings.prompts,
            &settings.user_name,
            &settings.user_description,
        ),
    }
}
