// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt assembly for Persona Chat.
//!
//! Turns a character, its conversation history, the user profile and the
//! prompt templates into a generation payload:
//! - **Contents**: history as alternating user/model turns, images inlined
//! - **System prompt**: template sections, profile blocks, slider narrative
//!   and the time-context sentence
//!
//! Assembly is pure and infallible. Missing data falls back to neutral text.

pub mod builder;
pub mod contents;
pub mod sliders;
pub mod time_context;

pub use builder::{BuiltPrompt, PromptInput, build_profile_prompt, build_request};
pub use contents::{data_url_payload_len, decode_data_url};
pub use time_context::{RESUME_GAP_MINUTES, SUMMARY_MARKER, TimeContext};
