// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Persona Chat.

use thiserror::Error;

/// The primary error type used across all Persona Chat crates.
///
/// Generation failures (transport, provider rejection, blocked or malformed
/// responses) are deliberately absent: those are normalized into
/// [`GenerationOutcome::Error`](crate::types::GenerationOutcome) inside the
/// provider adapter and never surface as `PersonaError`.
#[derive(Debug, Error)]
pub enum PersonaError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Provider construction errors (HTTP client setup, invalid headers).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local validation failed before any network call was made.
    #[error("{0}")]
    Validation(String),

    /// A backup or prompt document could not be restored.
    #[error("invalid backup: {0}")]
    InvalidBackup(String),

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A response cycle is already in flight.
    #[error("a response is already in progress")]
    Busy,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PersonaError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Returns true for errors the user caused and can fix locally.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
