// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Persona Chat.
//!
//! Provides mock adapters and fixtures for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Mock generation provider with queued outcomes and request capture
//! - [`MemoryStorage`] - Map-backed record store with write capture
//! - [`TestHarness`] - Temp SQLite database, mock provider and seeded state
//! - [`fixtures`] - Builders for settings, characters and histories

pub mod fixtures;
pub mod harness;
pub mod mock_provider;
pub mod mock_storage;

pub use harness::TestHarness;
pub use mock_provider::MockProvider;
pub use mock_storage::MemoryStorage;
