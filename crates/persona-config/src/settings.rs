// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-facing settings persisted alongside the chat state.
//!
//! Unlike [`PersonaConfig`](crate::model::PersonaConfig), these are edited at
//! runtime and stored as a JSON record. Every field carries a default so
//! partial documents (older backups, hand-edited prompt files) still load.

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::model::PersonaConfig;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Runtime settings of the chat engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub user_name: String,
    pub user_description: String,
    pub prompts: PromptTemplates,
    pub proactive_chat_enabled: bool,
    pub random_first_message_enabled: bool,
    /// Number of random characters scheduled per enable.
    pub random_character_count: u32,
    /// Lower bound of the random first-contact delay, in minutes.
    pub random_message_frequency_min: u32,
    /// Upper bound of the random first-contact delay, in minutes.
    pub random_message_frequency_max: u32,
    pub font_scale: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: PersonaConfig::default().gemini.model,
            user_name: String::new(),
            user_description: String::new(),
            prompts: PromptTemplates::default(),
            proactive_chat_enabled: false,
            random_first_message_enabled: false,
            random_character_count: 1,
            random_message_frequency_min: 10,
            random_message_frequency_max: 60,
            font_scale: 1.0,
        }
    }
}

impl Settings {
    /// First-run settings seeded from process configuration.
    ///
    /// API key resolution order: `gemini.api_key` -> `GEMINI_API_KEY` -> empty.
    pub fn seeded_from(config: &PersonaConfig) -> Self {
        let api_key = config
            .gemini
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .unwrap_or_default();

        Self {
            api_key,
            model: config.gemini.model.clone(),
            ..Self::default()
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn has_user_profile(&self) -> bool {
        !self.user_name.trim().is_empty() && !self.user_description.trim().is_empty()
    }

    /// The random first-contact window in minutes, ordered low to high.
    pub fn random_delay_window(&self) -> (u32, u32) {
        let (a, b) = (
            self.random_message_frequency_min,
            self.random_message_frequency_max,
        );
        (a.min(b), a.max(b))
    }
}

/// Prompt templates: the system prompt sections plus the profile-creation prompt.
///
/// This is also the shape of the prompt backup document. Missing keys fall
/// back to the built-in texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    pub main: MainPrompts,
    pub profile_creation: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            main: MainPrompts::default(),
            profile_creation: defaults::PROFILE_CREATION.to_string(),
        }
    }
}

/// Sections of the chat system prompt, in assembly order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainPrompts {
    pub system_rules: String,
    pub role_and_objective: String,
    pub memory_generation: String,
    pub character_acting: String,
    pub message_writing: String,
    pub language: String,
    pub additional_instructions: String,
    pub sticker_usage: String,
}

impl Default for MainPrompts {
    fn default() -> Self {
        Self {
            system_rules: defaults::SYSTEM_RULES.to_string(),
            role_and_objective: defaults::ROLE_AND_OBJECTIVE.to_string(),
            memory_generation: defaults::MEMORY_GENERATION.to_string(),
            character_acting: defaults::CHARACTER_ACTING.to_string(),
            message_writing: defaults::MESSAGE_WRITING.to_string(),
            language: defaults::LANGUAGE.to_string(),
            additional_instructions: defaults::ADDITIONAL_INSTRUCTIONS.to_string(),
            sticker_usage: defaults::STICKER_USAGE.to_string(),
        }
    }
}
