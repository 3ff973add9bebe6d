// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System prompt assembly.

use chrono::{DateTime, Utc};
use persona_config::PromptTemplates;
use persona_core::{Character, Message, Turn};

use crate::contents::history_to_turns;
use crate::sliders;
use crate::time_context::TimeContext;

/// Everything the builder needs for one request.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub user_name: &'a str,
    pub user_description: &'a str,
    pub character: &'a Character,
    pub history: &'a [Message],
    pub templates: &'a PromptTemplates,
    pub is_proactive: bool,
    pub force_summary: bool,
}

/// The request payload: conversation turns plus the system instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    pub contents: Vec<Turn>,
    pub system_prompt: String,
}

/// Builds the request payload. Pure: the same input and `now` always yield
/// the same output.
pub fn build_request(input: &PromptInput<'_>, now: DateTime<Utc>) -> BuiltPrompt {
    let time_context = TimeContext::classify(input.character, input.history, now);
    let vars = Placeholders {
        character_name: display_name(input.character),
        time_context: time_context.describe(input.user_name, input.force_summary),
        time_diff: time_context.minutes().to_string(),
    };

    let main = &input.templates.main;
    let sections = [
        vars.apply(&main.system_rules),
        vars.apply(&main.role_and_objective),
        user_profile(input.user_name, input.user_description),
        character_profile(input.character),
        sliders::narrative(input.character),
        vars.apply(&main.memory_generation),
        vars.apply(&main.character_acting),
        vars.apply(&main.message_writing),
        vars.apply(&main.language),
        vars.apply(&main.additional_instructions),
        vars.apply(&main.sticker_usage),
    ];

    let system_prompt = sections
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    BuiltPrompt {
        contents: history_to_turns(input.character, input.history, input.is_proactive),
        system_prompt,
    }
}

/// Builds the instruction sent to the profile-generation endpoint.
pub fn build_profile_prompt(
    templates: &PromptTemplates,
    user_name: &str,
    user_description: &str,
) -> String {
    format!(
        "{}\n\n{}",
        templates.profile_creation.trim(),
        user_profile(user_name, user_description)
    )
}

struct Placeholders {
    character_name: String,
    time_context: String,
    time_diff: String,
}

impl Placeholders {
    /// Substitutes placeholders in a template. User-authored profile text is
    /// never passed through here.
    fn apply(&self, template: &str) -> String {
        template
            .replace("{character.name}", &self.character_name)
            .replace("{timeContext}", &self.time_context)
            .replace("{timeDiff}", &self.time_diff)
    }
}

fn display_name(character: &Character) -> String {
    let name = character.name.trim();
    if name.is_empty() {
        "the character".to_string()
    } else {
        name.to_string()
    }
}

fn user_profile(user_name: &str, user_description: &str) -> String {
    let name = or_unknown(user_name);
    let description = or_unknown(user_description);
    format!("# User Profile\nName: {name}\nDescription: {description}")
}

fn character_profile(character: &Character) -> String {
    let mut block = format!(
        "# Character Profile\nName: {}\n{}\n\n## Memories\n",
        display_name(character),
        or_unknown(&character.prompt)
    );

    if character.memories.is_empty() {
        block.push_str("(no memories yet)");
    } else {
        let list: Vec<String> = character.memories.iter().map(|m| format!("- {m}")).collect();
        block.push_str(&list.join("\n"));
    }

    if !character.media.is_empty() {
        block.push_str("\n\n## Stickers\n");
        let list: Vec<String> = character
            .media
            .iter()
            .map(|m| {
                if m.name.is_empty() {
                    format!("- {}", m.id)
                } else {
                    format!("- {} ({})", m.id, m.name)
                }
            })
            .collect();
        block.push_str(&list.join("\n"));
    }

    block
}

fn or_unknown(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        "(not provided)"
    } else {
        trimmed
    }
}
