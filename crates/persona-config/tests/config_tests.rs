// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Persona Chat configuration system.

use std::path::Path;

use figment::Jail;
use persona_config::diagnostic::ConfigError;
use persona_config::model::PersonaConfig;
use persona_config::{
    load_and_validate_path, load_and_validate_str, load_config_from_path, load_config_from_str,
};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_persona_config() {
    let toml = r#"
[app]
log_level = "debug"

[gemini]
api_key = "AIza-test"
model = "gemini-2.0-flash"
base_url = "http://localhost:9999"
timeout_secs = 30

[storage]
database_path = "/tmp/persona-test.db"
wal_mode = false

[scheduler]
tick_secs = 15

[memory]
summary_interval = 4

[limits]
max_upload_bytes = 1024
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.app.log_level, "debug");
    assert_eq!(config.gemini.api_key.as_deref(), Some("AIza-test"));
    assert_eq!(config.gemini.model, "gemini-2.0-flash");
    assert_eq!(config.gemini.base_url, "http://localhost:9999");
    assert_eq!(config.gemini.timeout_secs, 30);
    assert_eq!(config.storage.database_path, "/tmp/persona-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.scheduler.tick_secs, 15);
    assert_eq!(config.memory.summary_interval, 4);
    assert_eq!(config.limits.max_upload_bytes, 1024);
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.app.log_level, "info");
    assert!(config.gemini.api_key.is_none());
    assert_eq!(config.gemini.model, "gemini-2.5-flash");
    assert_eq!(
        config.gemini.base_url,
        "https://generativelanguage.googleapis.com/v1beta"
    );
    assert_eq!(config.gemini.timeout_secs, 120);
    assert!(config.storage.database_path.ends_with("persona.db"));
    assert!(config.storage.wal_mode);
    assert_eq!(config.scheduler.tick_secs, 60);
    assert_eq!(config.memory.summary_interval, 10);
    assert_eq!(config.limits.max_upload_bytes, 5 * 1024 * 1024);
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[logging]
level = "debug"
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("logging"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// `PERSONA_GEMINI_API_KEY` maps to `gemini.api_key`, not `gemini.api.key`.
#[test]
fn env_var_overrides_nested_key_with_underscores() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "persona.toml",
            r#"
[gemini]
api_key = "from-file"

[limits]
max_upload_bytes = 10
"#,
        )?;
        jail.set_env("PERSONA_GEMINI_API_KEY", "from-env");
        jail.set_env("PERSONA_LIMITS_MAX_UPLOAD_BYTES", "2048");

        let config = load_config_from_path(Path::new("persona.toml"))
            .expect("env override should merge");
        assert_eq!(config.gemini.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.limits.max_upload_bytes, 2048);
        Ok(())
    });
}

/// Missing config files are silently skipped.
#[test]
fn missing_config_file_is_silently_skipped() {
    let config = load_config_from_path(Path::new("/nonexistent/path/persona.toml"))
        .expect("missing file should be silently skipped");
    assert_eq!(config.scheduler.tick_secs, 60);
}

/// Error output from load_and_validate_str names the key, a suggestion, and the valid keys.
#[test]
fn unknown_key_produces_suggestion_and_valid_keys() {
    let toml = r#"
[scheduler]
tick_sec = 5
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "tick_sec"
                && suggestion.as_deref() == Some("tick_secs")
                && valid_keys.contains("tick_secs")
        })
    });
    assert!(found, "expected UnknownKey for tick_sec, got: {errors:?}");
}

/// Invalid type (string where number expected) produces an InvalidType diagnostic.
#[test]
fn invalid_type_names_dotted_key() {
    let toml = r#"
[memory]
summary_interval = "often"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors.iter().any(
            |e| matches!(e, ConfigError::InvalidType { key, .. } if key == "memory.summary_interval")
        ),
        "got: {errors:?}"
    );
}

/// Diagnostics from a real file carry a source span pointing at the bad key.
#[test]
fn file_errors_carry_source_span() {
    Jail::expect_with(|jail| {
        jail.create_file("bad.toml", "[gemini]\nmodle = \"x\"\n")?;
        let path = jail.directory().join("bad.toml");

        let errors = load_and_validate_path(&path).expect_err("should reject");
        let spanned = errors.iter().any(|e| {
            matches!(e, ConfigError::UnknownKey { key, span: Some(_), src: Some(_), .. } if key == "modle")
        });
        assert!(spanned, "expected a spanned UnknownKey, got: {errors:?}");
        Ok(())
    });
}

/// Semantic validation runs after a successful parse.
#[test]
fn validation_rejects_zero_tick() {
    let toml = r#"
[scheduler]
tick_secs = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero tick should fail");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { key, .. } if key == "scheduler.tick_secs")
    ));
}

/// ConfigError renders through miette with code and help.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "api_kye".to_string(),
        suggestion: Some("api_key".to_string()),
        valid_keys: "api_key, model, base_url, timeout_secs".to_string(),
        span: None,
        src: None,
    };

    assert_eq!(
        error.code().map(|c| c.to_string()).as_deref(),
        Some("persona::config::unknown_key")
    );
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("did you mean `api_key`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("api_kye"));
}

/// Defaults always validate.
#[test]
fn defaults_validate() {
    let config = load_and_validate_str("").expect("defaults should validate");
    let default = PersonaConfig::default();
    assert_eq!(config.gemini.model, default.gemini.model);
}
