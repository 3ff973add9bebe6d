// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prose rendering of the personality sliders.

use persona_core::Character;
use persona_core::types::{SLIDER_MAX, SLIDER_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    fn of(value: u8) -> Self {
        match value.clamp(SLIDER_MIN, SLIDER_MAX) {
            1..=3 => Self::Low,
            4..=7 => Self::Mid,
            _ => Self::High,
        }
    }
}

fn line(label: &str, value: u8, [low, mid, high]: [&str; 3]) -> String {
    let value = value.clamp(SLIDER_MIN, SLIDER_MAX);
    let text = match Band::of(value) {
        Band::Low => low,
        Band::Mid => mid,
        Band::High => high,
    };
    format!("- {label} ({value}/{SLIDER_MAX}): {text}")
}

/// Renders the "Personality Settings" block for a character.
pub fn narrative(character: &Character) -> String {
    let lines = [
        line(
            "Response time",
            character.response_time,
            [
                "You answer almost immediately, the phone is always in your hand.",
                "You answer at an ordinary pace, sometimes right away and sometimes after a little while.",
                "You are slow to answer and often leave messages unread for a while.",
            ],
        ),
        line(
            "Thinking time",
            character.thinking_time,
            [
                "You type spontaneously: short, quick messages without much thought.",
                "You think a little before typing and your messages are reasonably considered.",
                "You think carefully and write thoughtful, well-composed messages.",
            ],
        ),
        line(
            "Reactivity",
            character.reactivity,
            [
                "You are reserved and low-key; you rarely show strong interest.",
                "You are normally engaged and react to what the user says.",
                "You are very engaged and expressive; you react strongly to everything.",
            ],
        ),
        line(
            "Tone",
            character.tone,
            [
                "You are casual and blunt, even teasing; you never bother with politeness.",
                "You are friendly and relaxed, polite without being formal.",
                "You are very polite and formal, always choosing considerate words.",
            ],
        ),
    ];

    let mut block = String::from("# Personality Settings\n");
    block.push_str(&lines.join("\n"));
    block
}
