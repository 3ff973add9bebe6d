// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Persona Chat.
//!
//! Application state is stored as four whole JSON records (`settings`,
//! `characters`, `messages`, `unread_counts`) in a single `records` table.
//! The database runs in WAL mode with embedded migrations, and every
//! statement goes through `tokio-rusqlite`'s single background connection.
//!
//! [`snapshot`] adds typed load/save helpers over any
//! [`StorageAdapter`](persona_core::StorageAdapter); [`backup`] handles the
//! portable backup and prompt-backup documents.

pub mod adapter;
pub mod backup;
pub mod database;
pub mod migrations;
pub mod snapshot;

pub use adapter::SqliteStorage;
pub use backup::{export_backup, export_prompts, import_prompts, parse_backup};
pub use database::Database;
pub use snapshot::{
    PersistedState, load_snapshot, save_characters, save_messages, save_settings,
    save_snapshot, save_unread_counts,
};
