// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-facing chat operations.
//!
//! Every operation validates locally before touching the store or the
//! network; validation failures are [`PersonaError::Validation`] with a
//! message meant for the user.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use persona_config::Settings;
use persona_core::types::{SLIDER_DEFAULT, SLIDER_MAX, SLIDER_MIN};
use persona_core::{
    Character, CharacterId, ConversationKey, MediaItem, Message, MessageId, PersonaError,
};
use persona_prompt::data_url_payload_len;
use persona_storage::PersistedState;

use crate::AgentOptions;
use crate::applier::ApplyReport;
use crate::context::CycleOptions;
use crate::cycle::CycleRunner;
use crate::scheduler::ProactiveScheduler;
use crate::store::{Action, AppState};

/// Editable fields of a character.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterDraft {
    /// `None` creates a new character.
    pub id: Option<CharacterId>,
    pub name: String,
    pub prompt: String,
    pub response_time: u8,
    pub thinking_time: u8,
    pub reactivity: u8,
    pub tone: u8,
    pub proactive_enabled: bool,
    pub media: Vec<MediaItem>,
}

impl Default for CharacterDraft {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            prompt: String::new(),
            response_time: SLIDER_DEFAULT,
            thinking_time: SLIDER_DEFAULT,
            reactivity: SLIDER_DEFAULT,
            tone: SLIDER_DEFAULT,
            proactive_enabled: true,
            media: Vec::new(),
        }
    }
}

impl From<&Character> for CharacterDraft {
    fn from(c: &Character) -> Self {
        Self {
            id: Some(c.id.clone()),
            name: c.name.clone(),
            prompt: c.prompt.clone(),
            response_time: c.response_time,
            thinking_time: c.thinking_time,
            reactivity: c.reactivity,
            tone: c.tone,
            proactive_enabled: c.proactive_enabled,
            media: c.media.clone(),
        }
    }
}

/// Chat operations over the shared runtime.
#[derive(Clone)]
pub struct ChatService {
    runner: Arc<CycleRunner>,
    scheduler: Arc<ProactiveScheduler>,
    options: AgentOptions,
}

impl ChatService {
    pub fn new(
        runner: Arc<CycleRunner>,
        scheduler: Arc<ProactiveScheduler>,
        options: AgentOptions,
    ) -> Self {
        Self {
            runner,
            scheduler,
            options,
        }
    }

    fn state(&self) -> Arc<AppState> {
        self.runner.store().state()
    }

    fn dispatch(&self, action: Action) -> Arc<AppState> {
        self.runner.store().dispatch(action)
    }

    /// Sends a user message and waits for the character's reply to be
    /// revealed.
    ///
    /// Fails with `Validation` before any network call when the API key is
    /// missing, the message is empty, or the attachment is unusable, and
    /// with `Busy` when another cycle is in flight.
    pub async fn send_message(
        &self,
        key: &ConversationKey,
        text: &str,
        attachment: Option<MediaItem>,
    ) -> Result<ApplyReport, PersonaError> {
        let state = self.state();
        if !state.settings.has_api_key() {
            return Err(PersonaError::Validation(
                "Set your Gemini API key in the settings before chatting.".into(),
            ));
        }
        let character = state
            .character_for(key)
            .ok_or_else(|| not_found("character", key))?;
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return Err(PersonaError::Validation("Message is empty.".into()));
        }
        if let Some(image) = &attachment {
            self.check_upload(image)?;
        }

        let _guard = self.runner.gate().try_acquire().ok_or(PersonaError::Busy)?;

        let sender = state.settings.user_name.clone();
        let now = Utc::now();
        let message = match attachment {
            Some(image) => Message::user_image(&sender, text, image, now),
            None => Message::from_user(&sender, text, now),
        };
        self.dispatch(Action::AppendMessage {
            key: key.clone(),
            message,
        });

        let after = self.dispatch(Action::IncrementSummaryCounter(character.id.clone()));
        let counter = after
            .character(&character.id)
            .map(|c| c.message_count_since_last_summary)
            .unwrap_or(0);
        let force_summary = counter >= self.options.summary_interval;
        if force_summary {
            debug!(character = %character.id, counter, "requesting memory summary");
        }

        self.runner.run(key, CycleOptions::reply(force_summary)).await
    }

    /// Replaces a message's text. The edited message gets a new id, which
    /// is returned.
    pub fn edit_message(
        &self,
        key: &ConversationKey,
        id: &MessageId,
        new_text: &str,
    ) -> Result<MessageId, PersonaError> {
        let state = self.state();
        let original = state
            .history(key)
            .iter()
            .find(|m| &m.id == id)
            .ok_or_else(|| not_found("message", id))?;
        let new_text = new_text.trim();
        if new_text.is_empty() && original.image.is_none() && original.sticker.is_none() {
            return Err(PersonaError::Validation("Message is empty.".into()));
        }

        let edited = Message {
            id: MessageId::generate(),
            content: new_text.to_string(),
            ..original.clone()
        };
        let new_id = edited.id.clone();
        self.dispatch(Action::ReplaceMessage {
            key: key.clone(),
            id: id.clone(),
            message: edited,
        });
        Ok(new_id)
    }

    pub fn delete_message(&self, key: &ConversationKey, id: &MessageId) -> Result<(), PersonaError> {
        if !self.state().history(key).iter().any(|m| &m.id == id) {
            return Err(not_found("message", id));
        }
        self.dispatch(Action::DeleteMessage {
            key: key.clone(),
            id: id.clone(),
        });
        Ok(())
    }

    /// Creates or updates a character. Memories and counters of an existing
    /// character are kept.
    pub fn save_character(&self, draft: CharacterDraft) -> Result<CharacterId, PersonaError> {
        if draft.name.trim().is_empty() {
            return Err(PersonaError::Validation("Character name is required.".into()));
        }
        if draft.prompt.trim().is_empty() {
            return Err(PersonaError::Validation(
                "Character prompt is required.".into(),
            ));
        }
        for (label, value) in [
            ("response time", draft.response_time),
            ("thinking time", draft.thinking_time),
            ("reactivity", draft.reactivity),
            ("tone", draft.tone),
        ] {
            if !(SLIDER_MIN..=SLIDER_MAX).contains(&value) {
                return Err(PersonaError::Validation(format!(
                    "{label} must be between {SLIDER_MIN} and {SLIDER_MAX}, got {value}."
                )));
            }
        }
        for item in &draft.media {
            self.check_upload(item)?;
        }

        let state = self.state();
        let mut character = match &draft.id {
            Some(id) => state
                .character(id)
                .cloned()
                .ok_or_else(|| not_found("character", id))?,
            None => Character::new("", ""),
        };
        character.name = draft.name.trim().to_string();
        character.prompt = draft.prompt.trim().to_string();
        character.response_time = draft.response_time;
        character.thinking_time = draft.thinking_time;
        character.reactivity = draft.reactivity;
        character.tone = draft.tone;
        character.proactive_enabled = draft.proactive_enabled;
        character.media = draft.media;

        let id = character.id.clone();
        info!(character = %id, name = %character.name, created = draft.id.is_none(), "character saved");
        self.dispatch(Action::UpsertCharacter(character));
        Ok(id)
    }

    pub fn delete_character(&self, id: &CharacterId) -> Result<(), PersonaError> {
        if self.state().character(id).is_none() {
            return Err(not_found("character", id));
        }
        self.dispatch(Action::DeleteCharacter(id.clone()));
        info!(character = %id, "character deleted");
        Ok(())
    }

    /// Opens a conversation (clearing its unread count), or closes the
    /// current one with `None`.
    pub fn select_conversation(&self, key: Option<&ConversationKey>) -> Result<(), PersonaError> {
        if let Some(key) = key {
            if self.state().character_for(key).is_none() {
                return Err(not_found("conversation", key));
            }
        }
        self.dispatch(Action::SelectConversation(key.cloned()));
        Ok(())
    }

    /// Edits the settings. Turning random first contact on schedules new
    /// first-contact timers.
    pub fn update_settings(
        &self,
        edit: impl FnOnce(&mut Settings),
    ) -> Result<Settings, PersonaError> {
        let before = self.state().settings.clone();
        let mut settings = before.clone();
        edit(&mut settings);

        if settings.random_character_count == 0 {
            return Err(PersonaError::Validation(
                "Random character count must be at least 1.".into(),
            ));
        }
        if settings.random_message_frequency_min == 0 || settings.random_message_frequency_max == 0
        {
            return Err(PersonaError::Validation(
                "Random message frequency must be at least 1 minute.".into(),
            ));
        }
        if !(settings.font_scale.is_finite() && settings.font_scale > 0.0) {
            return Err(PersonaError::Validation(
                "Font scale must be a positive number.".into(),
            ));
        }

        self.dispatch(Action::SetSettings(settings.clone()));
        if settings.random_first_message_enabled && !before.random_first_message_enabled {
            self.scheduler.schedule_random_characters();
        }
        Ok(settings)
    }

    /// Replaces characters, messages, unread counts and settings.
    pub fn restore(&self, persisted: PersistedState) {
        info!(
            characters = persisted.characters.len(),
            "restoring state from backup"
        );
        self.dispatch(Action::Restore(persisted));
    }

    fn check_upload(&self, item: &MediaItem) -> Result<(), PersonaError> {
        if !item.mime_type.starts_with("image/") {
            return Err(PersonaError::Validation(format!(
                "Only images can be attached, got {}.",
                item.mime_type
            )));
        }
        let size = data_url_payload_len(&item.data_url).ok_or_else(|| {
            PersonaError::Validation("Attachment is not a valid base64 data URL.".into())
        })?;
        if size > self.options.max_upload_bytes {
            return Err(PersonaError::Validation(format!(
                "Attachment is {size} bytes; the limit is {} bytes.",
                self.options.max_upload_bytes
            )));
        }
        Ok(())
    }
}

fn not_found(kind: &'static str, id: &impl std::fmt::Display) -> PersonaError {
    PersonaError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use persona_test_utils::{MockProvider, fixtures};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn service(state: AppState, provider: MockProvider) -> ChatService {
        let options = AgentOptions {
            tick: Duration::from_secs(60),
            summary_interval: 3,
            max_upload_bytes: 1024,
        };
        let runner = Arc::new(CycleRunner::new(
            Store::new(state),
            Arc::new(provider),
            CancellationToken::new(),
        ));
        let scheduler = Arc::new(ProactiveScheduler::new(Arc::clone(&runner), options.tick));
        ChatService::new(runner, scheduler, options)
    }

    fn seeded(provider: MockProvider) -> (ChatService, Character) {
        let c = fixtures::character("Mina");
        let state = AppState::from_persisted(fixtures::persisted(
            fixtures::settings(),
            vec![c.clone()],
        ));
        (service(state, provider), c)
    }

    #[tokio::test]
    async fn send_appends_user_message_and_reply() {
        let provider = MockProvider::new();
        provider.push_reply(&["hi Alex!"]).await;
        let (chat, c) = seeded(provider.clone());
        let key = c.conversation_key();

        let report = chat.send_message(&key, "  hello  ", None).await.unwrap();
        assert!(report.is_success());

        let state = chat.state();
        let history = state.history(&key);
        assert_eq!(history.len(), 2);
        assert!(history[0].is_me);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[0].sender, "Alex");
        assert_eq!(history[1].content, "hi Alex!");
        assert_eq!(provider.content_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_api_key_rejected_before_network() {
        let provider = MockProvider::new();
        let c = fixtures::character("Mina");
        let mut settings = fixtures::settings();
        settings.api_key.clear();
        let chat = service(
            AppState::from_persisted(fixtures::persisted(settings, vec![c.clone()])),
            provider.clone(),
        );

        let err = chat
            .send_message(&c.conversation_key(), "hello", None)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(provider.call_count().await, 0);
        assert!(chat.state().history(&c.conversation_key()).is_empty());
    }

    #[tokio::test]
    async fn oversize_attachment_rejected_before_network() {
        let provider = MockProvider::new();
        let (chat, c) = seeded(provider.clone());
        let err = chat
            .send_message(
                &c.conversation_key(),
                "look",
                Some(fixtures::image_of_size("big", 2048)),
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(provider.call_count().await, 0);
    }

    #[tokio::test]
    async fn image_only_message_is_accepted() {
        let provider = MockProvider::new();
        let (chat, c) = seeded(provider.clone());
        let key = c.conversation_key();
        chat.send_message(&key, "", Some(fixtures::image("pic")))
            .await
            .unwrap();
        let state = chat.state();
        assert!(state.history(&key)[0].image.is_some());
    }

    #[tokio::test]
    async fn empty_message_rejected() {
        let (chat, c) = seeded(MockProvider::new());
        let err = chat
            .send_message(&c.conversation_key(), "   ", None)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn send_while_busy_is_rejected() {
        let (chat, c) = seeded(MockProvider::new());
        let _guard = chat.runner.gate().try_acquire().unwrap();
        let err = chat
            .send_message(&c.conversation_key(), "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PersonaError::Busy));
    }

    #[tokio::test]
    async fn summary_forced_at_interval() {
        let provider = MockProvider::new();
        let (chat, c) = seeded(provider.clone());
        let key = c.conversation_key();
        for text in ["one", "two", "three"] {
            chat.send_message(&key, text, None).await.unwrap();
        }
        let requests = provider.content_requests().await;
        let marker = persona_prompt::SUMMARY_MARKER;
        assert!(!requests[0].system_prompt.contains(marker));
        assert!(!requests[1].system_prompt.contains(marker));
        assert!(requests[2].system_prompt.contains(marker));
    }

    #[tokio::test]
    async fn edit_assigns_new_id() {
        let (chat, c) = seeded(MockProvider::new());
        let key = c.conversation_key();
        chat.send_message(&key, "helo", None).await.unwrap();
        let old_id = chat.state().history(&key)[0].id.clone();

        let new_id = chat.edit_message(&key, &old_id, "hello").unwrap();
        assert_ne!(new_id, old_id);
        let state = chat.state();
        assert_eq!(state.history(&key)[0].id, new_id);
        assert_eq!(state.history(&key)[0].content, "hello");
        assert!(matches!(
            chat.edit_message(&key, &old_id, "x"),
            Err(PersonaError::NotFound { kind: "message", .. })
        ));
    }

    #[tokio::test]
    async fn delete_message_removes_it() {
        let (chat, c) = seeded(MockProvider::new());
        let key = c.conversation_key();
        chat.send_message(&key, "hello", None).await.unwrap();
        let id = chat.state().history(&key)[0].id.clone();
        chat.delete_message(&key, &id).unwrap();
        assert_eq!(chat.state().history(&key).len(), 1);
        assert!(chat.delete_message(&key, &id).is_err());
    }

    #[test]
    fn save_character_validates() {
        let (chat, _) = seeded(MockProvider::new());
        let blank = CharacterDraft {
            name: "  ".into(),
            prompt: "p".into(),
            ..CharacterDraft::default()
        };
        assert!(chat.save_character(blank).unwrap_err().is_validation());

        let loud = CharacterDraft {
            name: "Rin".into(),
            prompt: "p".into(),
            tone: 11,
            ..CharacterDraft::default()
        };
        assert!(chat.save_character(loud).unwrap_err().is_validation());
    }

    #[test]
    fn save_character_keeps_memories_on_update() {
        let (chat, c) = seeded(MockProvider::new());
        chat.dispatch(Action::AppendMemory {
            id: c.id.clone(),
            memory: "likes rain".into(),
        });
        let mut draft = CharacterDraft::from(&*chat.state().character(&c.id).unwrap());
        draft.tone = 9;
        chat.save_character(draft).unwrap();

        let state = chat.state();
        let saved = state.character(&c.id).unwrap();
        assert_eq!(saved.tone, 9);
        assert_eq!(saved.memories, vec!["likes rain"]);
    }

    #[test]
    fn new_character_gets_empty_conversation() {
        let (chat, _) = seeded(MockProvider::new());
        let id = chat
            .save_character(CharacterDraft {
                name: "Rin".into(),
                prompt: "a librarian".into(),
                ..CharacterDraft::default()
            })
            .unwrap();
        let state = chat.state();
        assert!(state.conversations.contains_key(&ConversationKey::from(&id)));
        assert_eq!(state.characters.len(), 2);
    }

    #[test]
    fn select_clears_unread_and_rejects_unknown() {
        let (chat, c) = seeded(MockProvider::new());
        let key = c.conversation_key();
        chat.dispatch(Action::SetUnread {
            key: key.clone(),
            count: 3,
        });
        chat.select_conversation(Some(&key)).unwrap();
        assert_eq!(chat.state().unread_count(&key), 0);
        assert!(
            chat.select_conversation(Some(&ConversationKey("nope".into())))
                .is_err()
        );
    }

    #[test]
    fn update_settings_validates() {
        let (chat, _) = seeded(MockProvider::new());
        let err = chat
            .update_settings(|s| s.random_character_count = 0)
            .unwrap_err();
        assert!(err.is_validation());

        let settings = chat.update_settings(|s| s.user_name = "Sam".into()).unwrap();
        assert_eq!(settings.user_name, "Sam");
        assert_eq!(chat.state().settings.user_name, "Sam");
    }

    #[tokio::test]
    async fn enabling_random_contact_schedules_timers() {
        let (chat, _) = seeded(MockProvider::new());
        chat.update_settings(|s| {
            s.random_first_message_enabled = true;
            s.random_character_count = 1;
        })
        .unwrap();
        // Disabling and enabling again schedules another round.
        chat.update_settings(|s| s.random_first_message_enabled = false)
            .unwrap();
        chat.update_settings(|s| s.random_first_message_enabled = true)
            .unwrap();
        chat.runner.cancel_token().cancel();
        chat.scheduler.wait_for_timers().await;
    }
}
