// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-context sentence injected into the system prompt.
//!
//! The sentence tells the model where the conversation stands: a first
//! contact, a continuation, or a resumption after a gap.

use chrono::{DateTime, Utc};
use persona_core::{Character, Message};

/// Minutes of silence after which a conversation counts as resumed.
pub const RESUME_GAP_MINUTES: i64 = 60;

/// Marker asking the model to produce a memory summary.
pub const SUMMARY_MARKER: &str = "(summarize_memory: true)";

/// Where the conversation stands relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeContext {
    /// A freshly generated character reaching out for the first time.
    FirstContactRandom,
    /// An existing character with no reply of its own yet.
    FirstContact,
    /// The last message is at least [`RESUME_GAP_MINUTES`] old.
    Resumed { minutes: i64 },
    /// An ongoing conversation.
    Continuing { minutes: i64 },
}

impl TimeContext {
    /// Classifies the conversation state.
    pub fn classify(character: &Character, history: &[Message], now: DateTime<Utc>) -> Self {
        let has_spoken = history.iter().any(|m| !m.is_me && !m.is_error);
        if !has_spoken {
            return if character.is_random {
                Self::FirstContactRandom
            } else {
                Self::FirstContact
            };
        }

        let minutes = elapsed_minutes(history, now).unwrap_or(0);
        if minutes >= RESUME_GAP_MINUTES {
            Self::Resumed { minutes }
        } else {
            Self::Continuing { minutes }
        }
    }

    /// Minutes since the last message, as substituted for `{timeDiff}`.
    pub fn minutes(&self) -> i64 {
        match self {
            Self::Resumed { minutes } | Self::Continuing { minutes } => *minutes,
            Self::FirstContactRandom | Self::FirstContact => 0,
        }
    }

    /// Renders the sentence for `{timeContext}`.
    pub fn describe(&self, user_name: &str, force_summary: bool) -> String {
        let user = if user_name.trim().is_empty() {
            "the user"
        } else {
            user_name.trim()
        };

        let mut text = match self {
            Self::FirstContactRandom => format!(
                "You have never talked to {user} before. You found their contact and are messaging them for the very first time, \
                 out of the blue. Introduce yourself naturally and give them a reason to reply."
            ),
            Self::FirstContact => format!(
                "This is the first time you and {user} talk. Open with a natural greeting that fits your personality."
            ),
            Self::Resumed { minutes } => format!(
                "The last message in this chat was {} ago. The previous topic is over. \
                 Start a new, unrelated topic the way you would after not talking to {user} for a while.",
                describe_gap(*minutes)
            ),
            Self::Continuing { minutes } => format!(
                "You are in the middle of a conversation with {user}. The last message was {minutes} minute(s) ago. \
                 Continue naturally from where it left off."
            ),
        };

        if force_summary {
            text.push(' ');
            text.push_str(SUMMARY_MARKER);
        }
        text
    }
}

/// Minutes between the last message and `now`, never negative.
pub fn elapsed_minutes(history: &[Message], now: DateTime<Utc>) -> Option<i64> {
    history
        .last()
        .map(|m| (now - m.created_at).num_minutes().max(0))
}

fn describe_gap(minutes: i64) -> String {
    match minutes {
        m if m < 120 => "about an hour".to_string(),
        m if m < 60 * 24 => format!("about {} hours", m / 60),
        m if m < 60 * 48 => "about a day".to_string(),
        m => format!("about {} days", m / (60 * 24)),
    }
}
