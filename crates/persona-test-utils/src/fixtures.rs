// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixture builders shared by integration tests.

use chrono::{DateTime, Duration, Utc};

use persona_config::Settings;
use persona_core::{Character, Conversations, MediaItem, Message};
use persona_storage::PersistedState;

/// API key used by every fixture.
pub const TEST_API_KEY: &str = "test-api-key";

/// Settings with an API key and a complete user profile.
pub fn settings() -> Settings {
    Settings {
        api_key: TEST_API_KEY.to_string(),
        model: "gemini-test".to_string(),
        user_name: "Alex".to_string(),
        user_description: "a night-shift nurse who loves cats".to_string(),
        ..Settings::default()
    }
}

/// A character with default sliders.
pub fn character(name: &str) -> Character {
    Character::new(name, format!("{name} is a warm, curious friend."))
}

/// A character with the given reactivity and nothing else changed.
pub fn character_with_reactivity(name: &str, reactivity: u8) -> Character {
    Character {
        reactivity,
        ..character(name)
    }
}

/// A tiny valid PNG-typed image, as a data URL.
pub fn image(id: &str) -> MediaItem {
    MediaItem {
        id: id.to_string(),
        name: format!("{id}.png"),
        data_url: "data:image/png;base64,iVBORw0KGgo=".to_string(),
        mime_type: "image/png".to_string(),
    }
}

/// An image whose decoded payload is `bytes` long.
pub fn image_of_size(id: &str, bytes: usize) -> MediaItem {
    use base64::Engine as _;
    let payload = base64::engine::general_purpose::STANDARD.encode(vec![0u8; bytes]);
    MediaItem {
        data_url: format!("data:image/png;base64,{payload}"),
        ..image(id)
    }
}

/// A user/character exchange that ended `minutes_ago` minutes before `now`.
pub fn exchange(character: &Character, minutes_ago: i64, now: DateTime<Utc>) -> Vec<Message> {
    let end = now - Duration::minutes(minutes_ago);
    vec![
        Message::from_user("Alex", "hey, how was your day?", end - Duration::minutes(1)),
        Message::from_character(&character.name, "busy but good!", end),
    ]
}

/// Persisted state holding `characters`, each with an empty conversation.
pub fn persisted(settings: Settings, characters: Vec<Character>) -> PersistedState {
    let messages: Conversations = characters
        .iter()
        .map(|c| (c.conversation_key(), Vec::new()))
        .collect();
    PersistedState {
        settings,
        characters,
        messages,
        unread_counts: Default::default(),
    }
}
