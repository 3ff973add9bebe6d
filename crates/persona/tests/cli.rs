// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs the `persona` binary against a temp database.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

struct Env {
    dir: tempfile::TempDir,
    config: PathBuf,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("persona.db");
        let config = dir.path().join("persona.toml");
        std::fs::write(
            &config,
            format!(
                "[storage]\ndatabase_path = {:?}\n\n[app]\nlog_level = \"warn\"\n",
                db.to_string_lossy()
            ),
        )
        .unwrap();
        Self { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_persona"))
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn characters_on_fresh_database() {
    let env = Env::new();
    let out = env.run(&["characters"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("no characters yet"));
}

#[test]
fn backup_writes_all_four_records() {
    let env = Env::new();
    let file = env.path("backup.json");
    let out = env.run(&["backup", arg(&file)]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    for key in ["settings", "characters", "messages", "unreadCounts"] {
        assert!(doc.get(key).is_some(), "backup lacks {key}");
    }

    let out = env.run(&["restore", arg(&file)]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn restore_rejects_incomplete_backup() {
    let env = Env::new();
    let file = env.path("partial.json");
    std::fs::write(&file, r#"{"settings": {}}"#).unwrap();

    let out = env.run(&["restore", arg(&file)]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing required keys"));
}

#[test]
fn prompts_round_trip_through_files() {
    let env = Env::new();
    let exported = env.path("prompts.json");
    let out = env.run(&["prompts", "export", arg(&exported)]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = env.run(&["prompts", "import", arg(&exported)]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn unknown_config_key_fails() {
    let env = Env::new();
    std::fs::write(&env.config, "[storage]\ndatabse_path = \"x.db\"\n").unwrap();
    let out = env.run(&["characters"]);
    assert_eq!(out.status.code(), Some(1));
}
