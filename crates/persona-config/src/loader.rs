// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./persona.toml` > `~/.config/persona/persona.toml` > `/etc/persona/persona.toml`
//! with environment variable overrides via `PERSONA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PersonaConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/persona/persona.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "persona.toml";

/// Section prefixes recognized in `PERSONA_*` variable names.
const ENV_SECTIONS: &[&str] = &["app", "gemini", "storage", "scheduler", "memory", "limits"];

/// Path of the per-user config file, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("persona/persona.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/persona/persona.toml` (system-wide)
/// 3. `~/.config/persona/persona.toml` (user XDG config)
/// 4. `./persona.toml` (local directory)
/// 5. `PERSONA_*` environment variables
pub fn load_config() -> Result<PersonaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PersonaConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PersonaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PersonaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PersonaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PersonaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `PERSONA_GEMINI_API_KEY` maps to `gemini.api_key` and
/// `PERSONA_LIMITS_MAX_UPLOAD_BYTES` to `limits.max_upload_bytes`.
fn env_provider() -> Env {
    Env::prefixed("PERSONA_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_first_section_underscore() {
        assert_eq!(map_env_key("gemini_api_key"), "gemini.api_key");
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(
            map_env_key("limits_max_upload_bytes"),
            "limits.max_upload_bytes"
        );
        assert_eq!(map_env_key("scheduler_tick_secs"), "scheduler.tick_secs");
    }

    #[test]
    fn unknown_sections_pass_through() {
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }
}
