// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as known log levels, non-empty paths, and positive intervals.

use crate::diagnostic::ConfigError;
use crate::model::PersonaConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &PersonaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.app.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::invalid(
            "app.log_level",
            format!(
                "`{}` is not one of {}",
                config.app.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    let base_url = config.gemini.base_url.trim();
    if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
        errors.push(ConfigError::invalid(
            "gemini.base_url",
            format!("`{base_url}` must start with http:// or https://"),
        ));
    }

    if config.gemini.model.trim().is_empty() {
        errors.push(ConfigError::invalid("gemini.model", "must not be empty"));
    }

    if config.gemini.timeout_secs == 0 {
        errors.push(ConfigError::invalid(
            "gemini.timeout_secs",
            "must be at least 1",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid(
            "storage.database_path",
            "must not be empty",
        ));
    }

    if config.scheduler.tick_secs == 0 {
        errors.push(ConfigError::invalid(
            "scheduler.tick_secs",
            "must be at least 1",
        ));
    }

    if config.memory.summary_interval == 0 {
        errors.push(ConfigError::invalid(
            "memory.summary_interval",
            "must be at least 1",
        ));
    }

    if config.limits.max_upload_bytes == 0 {
        errors.push(ConfigError::invalid(
            "limits.max_upload_bytes",
            "must be greater than zero",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
