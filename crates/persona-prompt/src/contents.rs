// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of chat history into model conversation turns.

use base64::Engine;
use persona_core::{Character, MediaItem, Message, MessageKind, Turn, TurnPart, TurnRole};
use tracing::debug;

/// Marker appended when an attached image cannot be decoded.
pub const IMAGE_UNAVAILABLE: &str = "[image unavailable]";

/// Synthetic turn that lets a character open an empty conversation.
pub const BEGIN_CONVERSATION: &str =
    "(System: the chat is empty. Send the very first message of this conversation now.)";

/// Synthetic turn that lets a character follow up without a user message.
pub const CONTINUE_CONVERSATION: &str =
    "(System: the user has not written anything new. Send a message on your own initiative.)";

/// Converts history into turns. Error-flagged messages are not part of the
/// conversation and are skipped.
pub fn history_to_turns(character: &Character, history: &[Message], is_proactive: bool) -> Vec<Turn> {
    let mut turns: Vec<Turn> = history
        .iter()
        .filter(|m| !m.is_error)
        .map(|m| message_to_turn(character, m))
        .collect();

    if is_proactive {
        let nudge = if turns.is_empty() {
            BEGIN_CONVERSATION
        } else {
            CONTINUE_CONVERSATION
        };
        turns.push(Turn::text(TurnRole::User, nudge));
    }

    turns
}

fn message_to_turn(character: &Character, message: &Message) -> Turn {
    let role = if message.is_me {
        TurnRole::User
    } else {
        TurnRole::Model
    };

    let parts = match message.kind {
        MessageKind::Text => vec![TurnPart::Text(message.content.clone())],
        MessageKind::Image => image_parts(&message.content, message.image.as_ref()),
        MessageKind::Sticker => {
            let reference = message.sticker.as_deref().unwrap_or_default();
            let label = character
                .sticker(reference)
                .map(|s| if s.name.is_empty() { s.id.as_str() } else { s.name.as_str() })
                .unwrap_or(reference);
            vec![TurnPart::Text(format!("[sent a sticker: {label}]"))]
        }
    };

    Turn { role, parts }
}

fn image_parts(caption: &str, image: Option<&MediaItem>) -> Vec<TurnPart> {
    let inline = image.and_then(|img| {
        let decoded = decode_data_url(&img.data_url);
        if decoded.is_none() {
            debug!(image_id = %img.id, "attached image is not a decodable data URL");
        }
        decoded.map(|(mime, data)| TurnPart::InlineData {
            mime_type: mime.unwrap_or_else(|| img.mime_type.clone()),
            data,
        })
    });

    match inline {
        Some(part) => {
            let mut parts = vec![part];
            if !caption.trim().is_empty() {
                parts.push(TurnPart::Text(caption.to_string()));
            }
            parts
        }
        None => {
            let text = if caption.trim().is_empty() {
                IMAGE_UNAVAILABLE.to_string()
            } else {
                format!("{caption} {IMAGE_UNAVAILABLE}")
            };
            vec![TurnPart::Text(text)]
        }
    }
}

/// Splits a `data:<mime>;base64,<payload>` URL.
///
/// Returns the declared MIME type (if any) and the payload, which is
/// verified to be valid base64 and passed through unchanged.
pub fn decode_data_url(url: &str) -> Option<(Option<String>, String)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let payload = payload.trim();

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .ok()
        .filter(|bytes| !bytes.is_empty())?;

    let mime = (!mime.is_empty()).then(|| mime.to_string());
    Some((mime, payload.to_string()))
}

/// Size in bytes of the decoded payload of a data URL.
pub fn data_url_payload_len(url: &str) -> Option<usize> {
    let (_, payload) = decode_data_url(url)?;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .ok()
        .map(|b| b.len())
}
