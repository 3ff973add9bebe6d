// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across Persona Chat crates.
//!
//! Persisted types serialize with camelCase keys so that backup documents keep
//! the same shape as the stored records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lowest value a personality slider can take.
pub const SLIDER_MIN: u8 = 1;
/// Highest value a personality slider can take.
pub const SLIDER_MAX: u8 = 10;
/// Value used when a slider is missing from a stored character.
pub const SLIDER_DEFAULT: u8 = 5;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
}

/// Stable identifier of a character.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub String);

impl CharacterId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a single message. Never derived from a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a conversation: a character id or a chat-room id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(pub String);

impl From<&CharacterId> for ConversationKey {
    fn from(id: &CharacterId) -> Self {
        Self(id.0.clone())
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An uploaded asset: a persona's sticker or an image attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub data_url: String,
    pub mime_type: String,
}

fn default_slider() -> u8 {
    SLIDER_DEFAULT
}

fn default_true() -> bool {
    true
}

/// A persona the user converses with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_slider")]
    pub response_time: u8,
    #[serde(default = "default_slider")]
    pub thinking_time: u8,
    #[serde(default = "default_slider")]
    pub reactivity: u8,
    #[serde(default = "default_slider")]
    pub tone: u8,
    #[serde(default)]
    pub memories: Vec<String>,
    #[serde(default = "default_true")]
    pub proactive_enabled: bool,
    #[serde(default)]
    pub message_count_since_last_summary: u32,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(default)]
    pub is_random: bool,
}

impl Character {
    /// Creates a character with default sliders and no history.
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: CharacterId::generate(),
            name: name.into(),
            prompt: prompt.into(),
            response_time: SLIDER_DEFAULT,
            thinking_time: SLIDER_DEFAULT,
            reactivity: SLIDER_DEFAULT,
            tone: SLIDER_DEFAULT,
            memories: Vec::new(),
            proactive_enabled: true,
            message_count_since_last_summary: 0,
            media: Vec::new(),
            is_random: false,
        }
    }

    /// Conversation key of this character's one-to-one chat.
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::from(&self.id)
    }

    /// Clamps every slider into `SLIDER_MIN..=SLIDER_MAX`.
    pub fn normalized(mut self) -> Self {
        for slider in [
            &mut self.response_time,
            &mut self.thinking_time,
            &mut self.reactivity,
            &mut self.tone,
        ] {
            *slider = (*slider).clamp(SLIDER_MIN, SLIDER_MAX);
        }
        self
    }

    /// Looks up a sticker by id or by name.
    pub fn sticker(&self, reference: &str) -> Option<&MediaItem> {
        self.media
            .iter()
            .find(|m| m.id == reference || (!m.name.is_empty() && m.name == reference))
    }
}

/// Content kind of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Sticker,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: String,
    /// Display time, `HH:MM` in local time.
    #[serde(default)]
    pub time: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_me: bool,
    #[serde(default)]
    pub is_error: bool,
    /// Attached image for `Image` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaItem>,
    /// Sticker asset reference for `Sticker` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<String>,
}

impl Message {
    fn base(sender: &str, kind: MessageKind, content: String, now: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::generate(),
            sender: sender.to_string(),
            kind,
            content,
            time: display_time(now),
            created_at: now,
            is_me: false,
            is_error: false,
            image: None,
            sticker: None,
        }
    }

    /// A text message written by the user.
    pub fn from_user(sender: &str, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            is_me: true,
            ..Self::base(sender, MessageKind::Text, content.into(), now)
        }
    }

    /// An image message written by the user, with an optional caption.
    pub fn user_image(
        sender: &str,
        caption: impl Into<String>,
        image: MediaItem,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            is_me: true,
            image: Some(image),
            ..Self::base(sender, MessageKind::Image, caption.into(), now)
        }
    }

    /// A text message written by a character.
    pub fn from_character(
        sender: &str,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::base(sender, MessageKind::Text, content.into(), now)
    }

    /// A sticker sent by a character.
    pub fn character_sticker(sender: &str, sticker: &str, now: DateTime<Utc>) -> Self {
        Self {
            sticker: Some(sticker.to_string()),
            ..Self::base(sender, MessageKind::Sticker, String::new(), now)
        }
    }

    /// An error-flagged message shown in place of a failed reply.
    pub fn error(sender: &str, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            is_error: true,
            ..Self::base(sender, MessageKind::Text, content.into(), now)
        }
    }
}

/// Formats a timestamp as the `HH:MM` display string.
pub fn display_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

/// Messages by conversation, each list in chronological order.
pub type Conversations = BTreeMap<ConversationKey, Vec<Message>>;

/// Unread counts by conversation.
pub type UnreadCounts = BTreeMap<ConversationKey, u32>;

/// One paced message in a generated reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    /// Milliseconds to wait before revealing this message.
    #[serde(default)]
    pub delay: u64,
    #[serde(default)]
    pub content: String,
    /// Sticker asset the character attaches after the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<String>,
}

/// A parsed reply, alive only while it is being revealed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingResponse {
    /// Milliseconds before the character "notices" the conversation.
    #[serde(default)]
    pub reaction_delay: u64,
    #[serde(default)]
    pub messages: Vec<ResponseMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_memory: Option<String>,
}

impl PendingResponse {
    /// The memory to store, if the reply carried a non-blank one.
    pub fn memory_to_store(&self) -> Option<&str> {
        self.new_memory
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

/// Result of a content-generation call. Never an exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Reply(PendingResponse),
    Error(String),
}

/// A character profile invented by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedProfile {
    pub name: String,
    pub prompt: String,
}

/// Result of a profile-generation call. Never an exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileOutcome {
    Profile(GeneratedProfile),
    Error(String),
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One part of a conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPart {
    Text(String),
    /// Binary payload, already base64-encoded.
    InlineData { mime_type: String, data: String },
}

/// A single conversation turn sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub parts: Vec<TurnPart>,
}

impl Turn {
    pub fn text(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![TurnPart::Text(text.into())],
        }
    }
}

/// A fully assembled content-generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub api_key: String,
    pub model: String,
    pub contents: Vec<Turn>,
    pub system_prompt: String,
}

/// A request to invent a new character profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRequest {
    pub api_key: String,
    pub model: String,
    /// Instructions describing the user the new character should suit.
    pub prompt: String,
}
