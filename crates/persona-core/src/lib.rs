// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Persona Chat.
//!
//! This crate provides the domain types, the error type, and the adapter
//! traits used throughout the workspace. The Gemini provider and the SQLite
//! record store implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::PersonaError;
pub use types::{
    AdapterType, Character, CharacterId, ConversationKey, Conversations, GeneratedProfile,
    GenerationOutcome, GenerationRequest, HealthStatus, MediaItem, Message, MessageId,
    MessageKind, PendingResponse, ProfileOutcome, ProfileRequest, ResponseMessage, Turn,
    TurnPart, TurnRole, UnreadCounts,
};

pub use traits::{GenerationProvider, PluginAdapter, RecordKey, StorageAdapter};

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn persona_error_variants_render() {
        let cases = [
            (PersonaError::Config("bad".into()), "configuration error: bad"),
            (
                PersonaError::Validation("API key missing".into()),
                "API key missing",
            ),
            (
                PersonaError::NotFound {
                    kind: "character",
                    id: "c1".into(),
                },
                "character not found: c1",
            ),
            (PersonaError::Busy, "a response is already in progress"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn storage_helper_wraps_source() {
        let err = PersonaError::storage(std::io::Error::other("disk full"));
        assert!(err.to_string().contains("disk full"));
        assert!(!err.is_validation());
    }

    #[test]
    fn record_keys_are_fixed_strings() {
        let keys: Vec<&str> = RecordKey::iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["settings", "characters", "messages", "unread_counts"]);
    }

    #[test]
    fn adapter_type_round_trips_through_display() {
        use std::str::FromStr;
        for variant in [AdapterType::Provider, AdapterType::Storage] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_generation_provider<T: GenerationProvider>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
    }
}
