// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observable application state.
//!
//! [`AppState`] is an immutable snapshot. Every mutation is an [`Action`]
//! run through the pure [`reduce`] function; [`Store::dispatch`] swaps the
//! result in atomically and publishes the resulting [`StateChange`]s on a
//! broadcast feed that renderers and the persistence subscriber follow.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tracing::debug;

use persona_config::Settings;
use persona_core::{
    Character, CharacterId, ConversationKey, Conversations, Message, MessageId, UnreadCounts,
};
use persona_storage::PersistedState;

/// Capacity of the change feed before slow subscribers start lagging.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Where a conversation's reply reveal currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevealPhase {
    /// Reply received, waiting out the reaction delay.
    Waiting,
    /// Messages are being revealed one by one.
    Revealing,
    #[default]
    Idle,
}

impl std::fmt::Display for RevealPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevealPhase::Waiting => write!(f, "waiting"),
            RevealPhase::Revealing => write!(f, "revealing"),
            RevealPhase::Idle => write!(f, "idle"),
        }
    }
}

/// Transient UI flags. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    pub awaiting_response: bool,
    pub typing: BTreeSet<ConversationKey>,
    /// Only non-idle phases are kept.
    pub reveal_phase: BTreeMap<ConversationKey, RevealPhase>,
}

/// A complete snapshot of the application state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub settings: Settings,
    /// Display order; random characters are inserted at the front.
    pub characters: Vec<Character>,
    pub conversations: Conversations,
    pub unread: UnreadCounts,
    pub selected: Option<ConversationKey>,
    pub ui: UiState,
}

impl AppState {
    pub fn from_persisted(persisted: PersistedState) -> Self {
        let persisted = persisted.normalized();
        Self {
            settings: persisted.settings,
            characters: persisted.characters,
            conversations: persisted.messages,
            unread: persisted.unread_counts,
            selected: None,
            ui: UiState::default(),
        }
    }

    /// The persisted part of the state.
    pub fn to_persisted(&self) -> PersistedState {
        PersistedState {
            settings: self.settings.clone(),
            characters: self.characters.clone(),
            messages: self.conversations.clone(),
            unread_counts: self.unread.clone(),
        }
    }

    /// A state holding only `character` and an empty conversation, used for
    /// replies that are revealed before the character is shown to the user.
    pub fn detached(settings: Settings, character: Character) -> Self {
        let mut conversations = Conversations::new();
        conversations.insert(character.conversation_key(), Vec::new());
        Self {
            settings,
            characters: vec![character],
            conversations,
            ..Self::default()
        }
    }

    pub fn character(&self, id: &CharacterId) -> Option<&Character> {
        self.characters.iter().find(|c| &c.id == id)
    }

    /// The character owning a one-to-one conversation.
    pub fn character_for(&self, key: &ConversationKey) -> Option<&Character> {
        self.characters.iter().find(|c| c.id.0 == key.0)
    }

    /// Messages of a conversation, oldest first.
    pub fn history(&self, key: &ConversationKey) -> &[Message] {
        self.conversations.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn unread_count(&self, key: &ConversationKey) -> u32 {
        self.unread.get(key).copied().unwrap_or(0)
    }

    pub fn is_typing(&self, key: &ConversationKey) -> bool {
        self.ui.typing.contains(key)
    }

    pub fn reveal_phase(&self, key: &ConversationKey) -> RevealPhase {
        self.ui.reveal_phase.get(key).copied().unwrap_or_default()
    }

    fn is_selected(&self, key: &ConversationKey) -> bool {
        self.selected.as_ref() == Some(key)
    }
}

/// A state mutation.
#[derive(Debug, Clone)]
pub enum Action {
    SetSettings(Settings),
    /// Replace a character with the same id, or append it.
    UpsertCharacter(Character),
    InsertCharacterFront(Character),
    /// Removes the character, its messages and its unread entry.
    DeleteCharacter(CharacterId),
    /// Appends a memory and resets the summary counter.
    AppendMemory {
        id: CharacterId,
        memory: String,
    },
    IncrementSummaryCounter(CharacterId),
    /// Appends a message without touching unread counts.
    AppendMessage {
        key: ConversationKey,
        message: Message,
    },
    /// Appends a character message and counts it as unread unless the
    /// conversation is selected.
    DeliverMessage {
        key: ConversationKey,
        message: Message,
    },
    /// Replaces the whole message list of a conversation.
    SeedConversation {
        key: ConversationKey,
        messages: Vec<Message>,
    },
    ReplaceMessage {
        key: ConversationKey,
        id: MessageId,
        message: Message,
    },
    DeleteMessage {
        key: ConversationKey,
        id: MessageId,
    },
    /// Selects a conversation (clearing its unread count) or none.
    SelectConversation(Option<ConversationKey>),
    IncrementUnread(ConversationKey),
    SetUnread {
        key: ConversationKey,
        count: u32,
    },
    SetAwaitingResponse(bool),
    SetTyping {
        key: ConversationKey,
        typing: bool,
    },
    SetRevealPhase {
        key: ConversationKey,
        phase: RevealPhase,
    },
    /// Replace the persisted part of the state, e.g. from a backup.
    Restore(PersistedState),
}

/// What part of the state an action touched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateChange {
    Settings,
    Characters,
    Messages(ConversationKey),
    Unread,
    Selection,
    Ui,
}

impl StateChange {
    /// Whether the change affects a persisted record.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, StateChange::Selection | StateChange::Ui)
    }
}

/// Applies `action` to `state`. Pure: no I/O, no clock, no randomness.
///
/// An action that does not apply (unknown id, no-op flag change) returns an
/// equal state and no changes.
pub fn reduce(state: &AppState, action: Action) -> (AppState, Vec<StateChange>) {
    let mut next = state.clone();
    let mut changes = Vec::new();

    match action {
        Action::SetSettings(settings) => {
            if next.settings != settings {
                next.settings = settings;
                changes.push(StateChange::Settings);
            }
        }
        Action::UpsertCharacter(character) => {
            let character = character.normalized();
            let key = character.conversation_key();
            match next.characters.iter_mut().find(|c| c.id == character.id) {
                Some(existing) => *existing = character,
                None => next.characters.push(character),
            }
            changes.push(StateChange::Characters);
            if !next.conversations.contains_key(&key) {
                next.conversations.insert(key.clone(), Vec::new());
                changes.push(StateChange::Messages(key));
            }
        }
        Action::InsertCharacterFront(character) => {
            let character = character.normalized();
            let key = character.conversation_key();
            next.characters.retain(|c| c.id != character.id);
            next.characters.insert(0, character);
            changes.push(StateChange::Characters);
            if !next.conversations.contains_key(&key) {
                next.conversations.insert(key.clone(), Vec::new());
                changes.push(StateChange::Messages(key));
            }
        }
        Action::DeleteCharacter(id) => {
            let before = next.characters.len();
            next.characters.retain(|c| c.id != id);
            if next.characters.len() != before {
                let key = ConversationKey::from(&id);
                changes.push(StateChange::Characters);
                next.conversations.remove(&key);
                changes.push(StateChange::Messages(key.clone()));
                if next.unread.remove(&key).is_some() {
                    changes.push(StateChange::Unread);
                }
                if next.selected.as_ref() == Some(&key) {
                    next.selected = None;
                    changes.push(StateChange::Selection);
                }
                next.ui.typing.remove(&key);
                next.ui.reveal_phase.remove(&key);
            }
        }
        Action::AppendMemory { id, memory } => {
            let memory = memory.trim();
            if let Some(c) = next.characters.iter_mut().find(|c| c.id == id)
                && !memory.is_empty()
            {
                c.memories.push(memory.to_string());
                c.message_count_since_last_summary = 0;
                changes.push(StateChange::Characters);
            }
        }
        Action::IncrementSummaryCounter(id) => {
            if let Some(c) = next.characters.iter_mut().find(|c| c.id == id) {
                c.message_count_since_last_summary =
                    c.message_count_since_last_summary.saturating_add(1);
                changes.push(StateChange::Characters);
            }
        }
        Action::AppendMessage { key, message } => {
            next.conversations
                .entry(key.clone())
                .or_default()
                .push(message);
            changes.push(StateChange::Messages(key));
        }
        Action::DeliverMessage { key, message } => {
            next.conversations
                .entry(key.clone())
                .or_default()
                .push(message);
            let selected = next.is_selected(&key);
            changes.push(StateChange::Messages(key.clone()));
            if !selected {
                *next.unread.entry(key).or_insert(0) += 1;
                changes.push(StateChange::Unread);
            }
        }
        Action::SeedConversation { key, messages } => {
            next.conversations.insert(key.clone(), messages);
            changes.push(StateChange::Messages(key));
        }
        Action::ReplaceMessage { key, id, message } => {
            if let Some(slot) = next
                .conversations
                .get_mut(&key)
                .and_then(|list| list.iter_mut().find(|m| m.id == id))
            {
                *slot = message;
                changes.push(StateChange::Messages(key));
            }
        }
        Action::DeleteMessage { key, id } => {
            if let Some(list) = next.conversations.get_mut(&key) {
                let before = list.len();
                list.retain(|m| m.id != id);
                if list.len() != before {
                    changes.push(StateChange::Messages(key));
                }
            }
        }
        Action::SelectConversation(key) => {
            if next.selected != key {
                next.selected = key.clone();
                changes.push(StateChange::Selection);
            }
            if let Some(key) = key
                && next.unread.remove(&key).is_some()
            {
                changes.push(StateChange::Unread);
            }
        }
        Action::IncrementUnread(key) => {
            if !next.is_selected(&key) {
                *next.unread.entry(key).or_insert(0) += 1;
                changes.push(StateChange::Unread);
            }
        }
        Action::SetUnread { key, count } => {
            if next.is_selected(&key) || count == 0 {
                if next.unread.remove(&key).is_some() {
                    changes.push(StateChange::Unread);
                }
            } else if next.unread.insert(key, count) != Some(count) {
                changes.push(StateChange::Unread);
            }
        }
        Action::SetAwaitingResponse(flag) => {
            if next.ui.awaiting_response != flag {
                next.ui.awaiting_response = flag;
                changes.push(StateChange::Ui);
            }
        }
        Action::SetTyping { key, typing } => {
            let changed = if typing {
                next.ui.typing.insert(key)
            } else {
                next.ui.typing.remove(&key)
            };
            if changed {
                changes.push(StateChange::Ui);
            }
        }
        Action::SetRevealPhase { key, phase } => {
            let previous = if phase == RevealPhase::Idle {
                next.ui.reveal_phase.remove(&key)
            } else {
                next.ui.reveal_phase.insert(key, phase)
            };
            if previous.unwrap_or_default() != phase {
                changes.push(StateChange::Ui);
            }
        }
        Action::Restore(persisted) => {
            let restored = AppState::from_persisted(persisted);
            next.settings = restored.settings;
            next.characters = restored.characters;
            next.conversations = restored.conversations;
            next.unread = restored.unread;
            next.selected = None;
            next.ui = UiState::default();
            changes.push(StateChange::Settings);
            changes.push(StateChange::Characters);
            changes.extend(
                next.conversations
                    .keys()
                    .cloned()
                    .map(StateChange::Messages),
            );
            changes.push(StateChange::Unread);
            changes.push(StateChange::Selection);
            changes.push(StateChange::Ui);
        }
    }

    (next, changes)
}

struct StoreInner {
    state: ArcSwap<AppState>,
    changes: broadcast::Sender<StateChange>,
}

/// Shared handle to the application state. Clones are cheap.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub fn new(initial: AppState) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                state: ArcSwap::from_pointee(initial),
                changes,
            }),
        }
    }

    /// The current snapshot.
    pub fn state(&self) -> Arc<AppState> {
        self.inner.state.load_full()
    }

    /// Subscribes to the change feed. Only changes dispatched after this
    /// call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.inner.changes.subscribe()
    }

    /// Applies `action` atomically and publishes its changes. Returns the
    /// snapshot the action produced.
    pub fn dispatch(&self, action: Action) -> Arc<AppState> {
        let mut produced: Option<(Arc<AppState>, Vec<StateChange>)> = None;
        self.inner.state.rcu(|current| {
            let (next, changes) = reduce(current, action.clone());
            let next = Arc::new(next);
            produced = Some((Arc::clone(&next), changes));
            next
        });

        let Some((next, changes)) = produced else {
            return self.state();
        };
        for change in changes {
            debug!(change = ?change, "state changed");
            // No subscribers is fine.
            let _ = self.inner.changes.send(change);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn state_with(character: &Character) -> AppState {
        let mut state = AppState::default();
        state.characters.push(character.clone());
        state
            .conversations
            .insert(character.conversation_key(), Vec::new());
        state
    }

    #[test]
    fn deliver_counts_unread_only_when_not_selected() {
        let c = Character::new("Mina", "barista");
        let key = c.conversation_key();
        let state = state_with(&c);

        let (state, changes) = reduce(
            &state,
            Action::DeliverMessage {
                key: key.clone(),
                message: Message::from_character("Mina", "hi", Utc::now()),
            },
        );
        assert_eq!(state.unread_count(&key), 1);
        assert!(changes.contains(&StateChange::Unread));

        let (state, _) = reduce(&state, Action::SelectConversation(Some(key.clone())));
        let (state, changes) = reduce(
            &state,
            Action::DeliverMessage {
                key: key.clone(),
                message: Message::from_character("Mina", "again", Utc::now()),
            },
        );
        assert_eq!(state.unread_count(&key), 0);
        assert!(!state.unread.contains_key(&key));
        assert!(!changes.contains(&StateChange::Unread));
        assert_eq!(state.history(&key).len(), 2);
    }

    #[test]
    fn selecting_conversation_removes_unread_entry() {
        let c = Character::new("Mina", "barista");
        let key = c.conversation_key();
        let mut state = state_with(&c);
        state.unread.insert(key.clone(), 4);

        let (state, changes) = reduce(&state, Action::SelectConversation(Some(key.clone())));
        assert!(!state.unread.contains_key(&key));
        assert_eq!(changes, vec![StateChange::Selection, StateChange::Unread]);
    }

    #[test]
    fn deleting_character_removes_messages_and_unread() {
        let c = Character::new("Mina", "barista");
        let key = c.conversation_key();
        let mut state = state_with(&c);
        state
            .conversations
            .get_mut(&key)
            .unwrap()
            .push(Message::from_user("Alex", "hi", Utc::now()));
        state.unread.insert(key.clone(), 2);

        let (state, changes) = reduce(&state, Action::DeleteCharacter(c.id.clone()));
        assert!(state.characters.is_empty());
        assert!(!state.conversations.contains_key(&key));
        assert!(!state.unread.contains_key(&key));
        assert!(changes.contains(&StateChange::Characters));
        assert!(changes.contains(&StateChange::Unread));
    }

    #[test]
    fn deleting_unknown_character_is_noop() {
        let c = Character::new("Mina", "barista");
        let state = state_with(&c);
        let (next, changes) = reduce(&state, Action::DeleteCharacter(CharacterId("nope".into())));
        assert_eq!(next, state);
        assert!(changes.is_empty());
    }

    #[test]
    fn memory_append_resets_summary_counter() {
        let mut c = Character::new("Mina", "barista");
        c.message_count_since_last_summary = 9;
        let state = state_with(&c);

        let (state, _) = reduce(
            &state,
            Action::AppendMemory {
                id: c.id.clone(),
                memory: "  Alex has a cat named Miso ".into(),
            },
        );
        let stored = state.character(&c.id).unwrap();
        assert_eq!(stored.memories, vec!["Alex has a cat named Miso"]);
        assert_eq!(stored.message_count_since_last_summary, 0);
    }

    #[test]
    fn blank_memory_is_ignored() {
        let mut c = Character::new("Mina", "barista");
        c.message_count_since_last_summary = 3;
        let state = state_with(&c);
        let (next, changes) = reduce(
            &state,
            Action::AppendMemory {
                id: c.id.clone(),
                memory: "   ".into(),
            },
        );
        assert_eq!(next, state);
        assert!(changes.is_empty());
    }

    #[test]
    fn upsert_adds_message_list_and_clamps() {
        let mut c = Character::new("Mina", "barista");
        c.reactivity = 42;
        let (state, changes) = reduce(&AppState::default(), Action::UpsertCharacter(c.clone()));
        assert_eq!(state.character(&c.id).unwrap().reactivity, 10);
        assert!(state.conversations.contains_key(&c.conversation_key()));
        assert!(changes.contains(&StateChange::Messages(c.conversation_key())));
    }

    #[test]
    fn insert_front_puts_character_first() {
        let a = Character::new("A", "a");
        let b = Character::new("B", "b");
        let state = state_with(&a);
        let (state, _) = reduce(&state, Action::InsertCharacterFront(b.clone()));
        assert_eq!(state.characters[0].id, b.id);
        assert_eq!(state.characters[1].id, a.id);
    }

    #[test]
    fn replace_message_swaps_in_place() {
        let c = Character::new("Mina", "barista");
        let key = c.conversation_key();
        let mut state = state_with(&c);
        let first = Message::from_user("Alex", "one", Utc::now());
        let second = Message::from_user("Alex", "two", Utc::now());
        state
            .conversations
            .get_mut(&key)
            .unwrap()
            .extend([first.clone(), second.clone()]);

        let edited = Message::from_user("Alex", "uno", first.created_at);
        let (state, _) = reduce(
            &state,
            Action::ReplaceMessage {
                key: key.clone(),
                id: first.id.clone(),
                message: edited.clone(),
            },
        );
        let history = state.history(&key);
        assert_eq!(history[0], edited);
        assert_eq!(history[1], second);
    }

    #[test]
    fn reveal_phase_idle_is_not_stored() {
        let key = ConversationKey("c".into());
        let (state, _) = reduce(
            &AppState::default(),
            Action::SetRevealPhase {
                key: key.clone(),
                phase: RevealPhase::Waiting,
            },
        );
        assert_eq!(state.reveal_phase(&key), RevealPhase::Waiting);
        let (state, changes) = reduce(
            &state,
            Action::SetRevealPhase {
                key: key.clone(),
                phase: RevealPhase::Idle,
            },
        );
        assert!(state.ui.reveal_phase.is_empty());
        assert_eq!(changes, vec![StateChange::Ui]);
    }

    #[test]
    fn set_unread_respects_selection() {
        let key = ConversationKey("c".into());
        let (state, _) = reduce(
            &AppState::default(),
            Action::SetUnread {
                key: key.clone(),
                count: 3,
            },
        );
        assert_eq!(state.unread_count(&key), 3);

        let (state, _) = reduce(&state, Action::SelectConversation(Some(key.clone())));
        let (state, changes) = reduce(&state, Action::SetUnread { key: key.clone(), count: 5 });
        assert!(!state.unread.contains_key(&key));
        assert!(changes.is_empty());
    }

    #[test]
    fn restore_replaces_persisted_parts() {
        let c = Character::new("Mina", "barista");
        let mut state = state_with(&c);
        state.selected = Some(c.conversation_key());

        let replacement = Character::new("Rin", "librarian");
        let persisted = PersistedState {
            settings: Settings {
                user_name: "Sam".into(),
                ..Settings::default()
            },
            characters: vec![replacement.clone()],
            messages: Conversations::new(),
            unread_counts: UnreadCounts::new(),
        };
        let (state, changes) = reduce(&state, Action::Restore(persisted));
        assert_eq!(state.settings.user_name, "Sam");
        assert_eq!(state.characters.len(), 1);
        assert_eq!(state.characters[0].id, replacement.id);
        assert!(state.conversations.contains_key(&replacement.conversation_key()));
        assert!(state.selected.is_none());
        assert!(changes.contains(&StateChange::Settings));
    }

    #[tokio::test]
    async fn dispatch_publishes_changes() {
        let c = Character::new("Mina", "barista");
        let store = Store::new(state_with(&c));
        let mut rx = store.subscribe();

        let snapshot = store.dispatch(Action::IncrementSummaryCounter(c.id.clone()));
        assert_eq!(
            snapshot.character(&c.id).unwrap().message_count_since_last_summary,
            1
        );
        assert_eq!(rx.recv().await.unwrap(), StateChange::Characters);
        assert_eq!(store.state(), snapshot);
    }

    #[test]
    fn concurrent_dispatches_are_not_lost() {
        let c = Character::new("Mina", "barista");
        let store = Store::new(state_with(&c));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let id = c.id.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store.dispatch(Action::IncrementSummaryCounter(id.clone()));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(
            store
                .state()
                .character(&c.id)
                .unwrap()
                .message_count_since_last_summary,
            400
        );
    }
}
