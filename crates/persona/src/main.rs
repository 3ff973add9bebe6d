// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persona Chat - conversations with AI characters that write back at
//! their own pace.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod backup;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use persona_config::PersonaConfig;
use persona_core::{PersonaError, StorageAdapter};
use persona_storage::SqliteStorage;

/// Persona Chat - conversations with AI characters.
#[derive(Parser, Debug)]
#[command(name = "persona", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch the interactive chat shell.
    Shell {
        /// Open this character's conversation on start (name or id).
        #[arg(long)]
        character: Option<String>,
    },
    /// Write characters, messages and settings to a JSON backup file.
    Backup {
        file: PathBuf,
    },
    /// Replace the stored state with a JSON backup file.
    Restore {
        file: PathBuf,
    },
    /// Export or import the prompt templates.
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },
    /// List the stored characters.
    Characters,
}

#[derive(Subcommand, Debug)]
enum PromptsAction {
    /// Write the current prompt templates to a file.
    Export { file: PathBuf },
    /// Load prompt templates from a file.
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => persona_config::load_and_validate_path(path),
        None => persona_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            persona_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.app.log_level);

    let result = match cli.command {
        Some(Commands::Shell { character }) => shell::run_shell(config, character).await,
        Some(Commands::Backup { file }) => {
            with_storage(&config, |s| async move { backup::run_backup(s.as_ref(), &file).await })
                .await
        }
        Some(Commands::Restore { file }) => {
            with_storage(&config, |s| async move { backup::run_restore(s.as_ref(), &file).await })
                .await
        }
        Some(Commands::Prompts { action }) => match action {
            PromptsAction::Export { file } => {
                with_storage(&config, |s| async move {
                    backup::run_prompts_export(s.as_ref(), &file).await
                })
                .await
            }
            PromptsAction::Import { file } => {
                with_storage(&config, |s| async move {
                    backup::run_prompts_import(s.as_ref(), &file).await
                })
                .await
            }
        },
        Some(Commands::Characters) => shell::run_list_characters(&config).await,
        None => {
            println!("persona: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Opens the database, runs `f` against it and closes it again.
async fn with_storage<F, Fut>(config: &PersonaConfig, f: F) -> Result<(), PersonaError>
where
    F: FnOnce(std::sync::Arc<SqliteStorage>) -> Fut,
    Fut: std::future::Future<Output = Result<(), PersonaError>>,
{
    let storage = std::sync::Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    let result = f(std::sync::Arc::clone(&storage)).await;
    storage.close().await?;
    result
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so they do not interleave with shell output on stdout.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("persona={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn shell_accepts_character_flag() {
        let cli = Cli::try_parse_from(["persona", "shell", "--character", "Mina"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Shell { character: Some(ref c) }) if c == "Mina"
        ));
    }

    #[test]
    fn config_flag_is_global() {
        let cli =
            Cli::try_parse_from(["persona", "backup", "out.json", "--config", "p.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("p.toml")));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = persona_config::load_and_validate_str("").expect("empty config should be valid");
        assert_eq!(config.app.log_level, "info");
        assert_eq!(config.scheduler.tick_secs, PersonaConfig::default().scheduler.tick_secs);
    }
}
