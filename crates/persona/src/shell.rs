// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `persona shell` command implementation.
//!
//! Launches an interactive REPL with colored output and readline history.
//! Character replies, proactive messages and typing indicators are printed
//! from the store's change feed as they are revealed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use persona_agent::shutdown::install_signal_handler;
use persona_agent::{AppState, CharacterDraft, Engine, StateChange, Store};
use persona_config::PersonaConfig;
use persona_core::{
    Character, ConversationKey, GenerationProvider, MediaItem, Message, MessageKind, PersonaError,
    StorageAdapter,
};
use persona_gemini::GeminiProvider;
use persona_storage::SqliteStorage;

/// Time given to an in-flight reply when the shell exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A parsed line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Quit,
    Help,
    List,
    Open(String),
    Close,
    New { name: String, prompt: String },
    Delete,
    Image { path: String, caption: String },
    Memories,
    Set { key: String, value: String },
    Say(String),
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Say(line.to_string());
    };
    let (name, args) = rest.split_once(' ').unwrap_or((rest, ""));
    let args = args.trim();
    match name {
        "quit" | "exit" => Command::Quit,
        "help" => Command::Help,
        "list" => Command::List,
        "open" if !args.is_empty() => Command::Open(args.to_string()),
        "close" => Command::Close,
        "new" => match args.split_once('|') {
            Some((name, prompt)) => Command::New {
                name: name.trim().to_string(),
                prompt: prompt.trim().to_string(),
            },
            None => Command::Unknown(line.to_string()),
        },
        "delete" => Command::Delete,
        "image" if !args.is_empty() => {
            let (path, caption) = args.split_once(' ').unwrap_or((args, ""));
            Command::Image {
                path: path.to_string(),
                caption: caption.trim().to_string(),
            }
        }
        "memories" => Command::Memories,
        "set" => match args.split_once(' ') {
            Some((key, value)) => Command::Set {
                key: key.to_string(),
                value: value.trim().to_string(),
            },
            None => Command::Unknown(line.to_string()),
        },
        _ => Command::Unknown(line.to_string()),
    }
}

/// Finds a character by id or case-insensitive name.
fn resolve_character<'a>(state: &'a AppState, needle: &str) -> Option<&'a Character> {
    state
        .characters
        .iter()
        .find(|c| c.id.0 == needle)
        .or_else(|| {
            state
                .characters
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(needle))
        })
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

async fn load_image(path: &str) -> Result<MediaItem, PersonaError> {
    let path = Path::new(path);
    let mime = mime_for_path(path).ok_or_else(|| {
        PersonaError::Validation(format!(
            "Unsupported image type: {} (png, jpeg, gif or webp)",
            path.display()
        ))
    })?;
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        PersonaError::Validation(format!("Cannot read {}: {e}", path.display()))
    })?;
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(MediaItem {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        data_url: format!("data:{mime};base64,{payload}"),
        mime_type: mime.to_string(),
    })
}

fn format_message(message: &Message) -> String {
    let body = match message.kind {
        MessageKind::Text => message.content.clone(),
        MessageKind::Image => {
            let name = message.image.as_ref().map_or("image", |i| i.name.as_str());
            if message.content.is_empty() {
                format!("[image: {name}]")
            } else {
                format!("[image: {name}] {}", message.content)
            }
        }
        MessageKind::Sticker => format!("[sticker: {}]", message.sticker.as_deref().unwrap_or("?")),
    };
    let sender = if message.is_error {
        message.sender.red().bold()
    } else if message.is_me {
        message.sender.green().bold()
    } else {
        message.sender.cyan().bold()
    };
    let body = if message.is_error {
        body.red().to_string()
    } else {
        body
    };
    format!("{} {sender}: {body}", message.time.dimmed())
}

/// Prints new messages and typing indicators as the store changes.
struct Renderer {
    store: Store,
    changes: broadcast::Receiver<StateChange>,
    seen: HashMap<ConversationKey, usize>,
    typing: Option<ConversationKey>,
}

impl Renderer {
    fn new(store: Store) -> Self {
        let state = store.state();
        let seen = state
            .conversations
            .iter()
            .map(|(key, history)| (key.clone(), history.len()))
            .collect();
        Self {
            changes: store.subscribe(),
            store,
            seen,
            typing: None,
        }
    }

    async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.changes.recv() => match received {
                    Ok(StateChange::Messages(key)) => self.show_messages(&key),
                    Ok(StateChange::Ui) => self.show_typing(),
                    Ok(StateChange::Selection) => self.mark_selected_seen(),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "shell renderer lagged");
                        let keys: Vec<ConversationKey> =
                            self.store.state().conversations.keys().cloned().collect();
                        for key in keys {
                            self.show_messages(&key);
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    fn show_messages(&mut self, key: &ConversationKey) {
        let state = self.store.state();
        let history = state.history(key);
        let seen = self.seen.entry(key.clone()).or_insert(0);
        if history.len() <= *seen {
            *seen = history.len();
            return;
        }

        let fresh = &history[*seen..];
        *seen = history.len();
        if state.selected.as_ref() == Some(key) {
            for message in fresh.iter().filter(|m| !m.is_me) {
                println!("{}", format_message(message));
            }
        } else if let Some(character) = state.character_for(key) {
            println!(
                "{}",
                format!(
                    "({} new from {}; /open {} to read)",
                    state.unread_count(key).max(1),
                    character.name,
                    character.name
                )
                .yellow()
            );
        }
    }

    fn show_typing(&mut self) {
        let state = self.store.state();
        let typing_now = state
            .selected
            .as_ref()
            .filter(|key| state.is_typing(key))
            .cloned();
        if typing_now != self.typing {
            if let Some(key) = &typing_now
                && let Some(character) = state.character_for(key)
            {
                println!("{}", format!("{} is typing...", character.name).dimmed());
            }
            self.typing = typing_now;
        }
    }

    fn mark_selected_seen(&mut self) {
        let state = self.store.state();
        if let Some(key) = &state.selected {
            self.seen.insert(key.clone(), state.history(key).len());
        }
    }
}

fn print_help() {
    println!("{}", "commands".bold());
    for (usage, what) in [
        ("/list", "characters and unread counts"),
        ("/open <name>", "open a conversation"),
        ("/close", "close the current conversation"),
        ("/new <name> | <prompt>", "create a character"),
        ("/delete", "delete the current character"),
        ("/image <path> [caption]", "send an image"),
        ("/memories", "what the current character remembers"),
        ("/set <key> <value>", "api-key, model, name, about, proactive, random"),
        ("/quit", "exit"),
    ] {
        println!("  {:<26} {}", usage.yellow(), what);
    }
}

fn print_characters(state: &AppState) {
    if state.characters.is_empty() {
        println!("{}", "no characters yet; create one with /new".dimmed());
        return;
    }
    for character in &state.characters {
        let key = character.conversation_key();
        let unread = state.unread_count(&key);
        let marker = if state.selected.as_ref() == Some(&key) {
            "*".green().to_string()
        } else {
            " ".to_string()
        };
        let unread = if unread > 0 {
            format!(" ({unread} unread)").yellow().to_string()
        } else {
            String::new()
        };
        let random = if character.is_random { " [random]" } else { "" };
        println!("{marker} {}{random}{unread}", character.name.bold());
    }
}

fn print_conversation(state: &AppState, key: &ConversationKey) {
    let Some(character) = state.character_for(key) else {
        return;
    };
    println!("{}", format!("-- {} --", character.name).bold());
    for message in state.history(key) {
        println!("{}", format_message(message));
    }
}

fn parse_switch(value: &str) -> Result<bool, PersonaError> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => Err(PersonaError::Validation(format!(
            "Expected on or off, got {other}."
        ))),
    }
}

/// Runs one non-quit command against the engine.
async fn handle_command(engine: &Engine, command: Command) -> Result<(), PersonaError> {
    let chat = engine.chat();
    let state = engine.store().state();
    match command {
        Command::Quit => {}
        Command::Help => print_help(),
        Command::List => print_characters(&state),
        Command::Open(needle) => {
            let character = resolve_character(&state, &needle).ok_or_else(|| {
                PersonaError::NotFound {
                    kind: "character",
                    id: needle.clone(),
                }
            })?;
            let key = character.conversation_key();
            chat.select_conversation(Some(&key))?;
            print_conversation(&engine.store().state(), &key);
        }
        Command::Close => chat.select_conversation(None)?,
        Command::New { name, prompt } => {
            let id = chat.save_character(CharacterDraft {
                name,
                prompt,
                ..CharacterDraft::default()
            })?;
            chat.select_conversation(Some(&ConversationKey::from(&id)))?;
            println!("{}", "character created".dimmed());
        }
        Command::Delete => {
            let character = selected_character(&state)?;
            chat.delete_character(&character.id)?;
            println!("{}", format!("{} deleted", character.name).dimmed());
        }
        Command::Image { path, caption } => {
            let key = selected_key(&state)?;
            let image = load_image(&path).await?;
            chat.send_message(&key, &caption, Some(image)).await?;
        }
        Command::Memories => {
            let character = selected_character(&state)?;
            if character.memories.is_empty() {
                println!("{}", "no memories yet".dimmed());
            }
            for memory in &character.memories {
                println!("  - {memory}");
            }
        }
        Command::Set { key, value } => {
            let switch = match key.as_str() {
                "proactive" | "random" => Some(parse_switch(&value)?),
                _ => None,
            };
            chat.update_settings(|s| match (key.as_str(), switch) {
                ("api-key", _) => s.api_key = value.clone(),
                ("model", _) => s.model = value.clone(),
                ("name", _) => s.user_name = value.clone(),
                ("about", _) => s.user_description = value.clone(),
                ("proactive", Some(on)) => s.proactive_chat_enabled = on,
                ("random", Some(on)) => s.random_first_message_enabled = on,
                _ => {}
            })?;
            println!("{}", "settings saved".dimmed());
        }
        Command::Say(text) => {
            let key = selected_key(&state)?;
            chat.send_message(&key, &text, None).await?;
        }
        Command::Unknown(line) => {
            println!("{} {line} (try /help)", "unknown command:".yellow());
        }
    }
    Ok(())
}

fn selected_key(state: &AppState) -> Result<ConversationKey, PersonaError> {
    state.selected.clone().ok_or_else(|| {
        PersonaError::Validation("Open a conversation first (/list, /open <name>).".into())
    })
}

fn selected_character(state: &AppState) -> Result<Character, PersonaError> {
    let key = selected_key(state)?;
    state
        .character_for(&key)
        .cloned()
        .ok_or(PersonaError::NotFound {
            kind: "character",
            id: key.0,
        })
}

/// Input read by the line reader thread.
enum Input {
    Line(String),
    End,
}

/// Reads lines on a dedicated thread. The thread waits for an ack after
/// each line so the prompt is redrawn only once the command has finished.
fn spawn_line_reader(
    prompt: String,
) -> Result<(mpsc::Receiver<Input>, std::sync::mpsc::Sender<()>), PersonaError> {
    let (tx, rx) = mpsc::channel(1);
    let (ack_tx, ack_rx) = std::sync::mpsc::channel();

    std::thread::Builder::new()
        .name("persona-readline".into())
        .spawn(move || {
            let mut rl = match DefaultEditor::new() {
                Ok(rl) => rl,
                Err(e) => {
                    eprintln!("{}: failed to initialize readline: {e}", "error".red());
                    let _ = tx.blocking_send(Input::End);
                    return;
                }
            };
            loop {
                match rl.readline(&prompt) {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => {
                        let _ = rl.add_history_entry(line.as_str());
                        if tx.blocking_send(Input::Line(line)).is_err() || ack_rx.recv().is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                        let _ = tx.blocking_send(Input::End);
                        break;
                    }
                    Err(e) => {
                        eprintln!("{}: {e}", "error".red());
                        let _ = tx.blocking_send(Input::End);
                        break;
                    }
                }
            }
        })
        .map_err(|e| PersonaError::Internal(format!("failed to start readline thread: {e}")))?;

    Ok((rx, ack_tx))
}

/// Runs the `persona shell` interactive REPL.
pub async fn run_shell(config: PersonaConfig, open: Option<String>) -> Result<(), PersonaError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter + Send + Sync> = Arc::new(storage);
    let provider: Arc<dyn GenerationProvider + Send + Sync> =
        Arc::new(GeminiProvider::new(&config.gemini)?);

    let cancel = install_signal_handler();
    let engine = Engine::start(&config, provider, storage, cancel.clone()).await?;

    let renderer = tokio::spawn(Renderer::new(engine.store().clone()).run(cancel.clone()));

    println!("{}", "persona shell".bold().green());
    println!("Type {} for commands, {} to exit.\n", "/help".yellow(), "/quit".yellow());
    if !engine.store().state().settings.has_api_key() {
        println!(
            "{}",
            "No Gemini API key set. Use /set api-key <key> or GEMINI_API_KEY.".yellow()
        );
    }
    if let Some(needle) = open
        && let Err(e) = handle_command(&engine, Command::Open(needle)).await
    {
        eprintln!("{}: {e}", "error".red());
    }

    let (mut lines, ack) = spawn_line_reader(format!("{}> ", "persona".green()))?;

    loop {
        let input = tokio::select! {
            _ = cancel.cancelled() => break,
            input = lines.recv() => input,
        };
        let Some(Input::Line(line)) = input else {
            break;
        };

        let command = parse_command(&line);
        if command == Command::Quit {
            break;
        }
        match handle_command(&engine, command).await {
            Ok(()) => {}
            Err(PersonaError::Validation(notice)) => eprintln!("{}", notice.yellow()),
            Err(PersonaError::Busy) => {
                eprintln!("{}", "Still replying, wait a moment.".yellow());
            }
            Err(e) => eprintln!("{}: {e}", "error".red()),
        }
        if ack.send(()).is_err() {
            break;
        }
    }
    drop(ack);

    engine.shutdown(DRAIN_TIMEOUT).await?;
    if let Err(e) = renderer.await {
        warn!(error = %e, "shell renderer failed");
    }
    println!("{}", "goodbye".dimmed());
    Ok(())
}

/// Runs `persona characters`: prints the stored characters.
pub async fn run_list_characters(config: &PersonaConfig) -> Result<(), PersonaError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let persisted = persona_storage::load_snapshot(
        &storage,
        persona_config::Settings::seeded_from(config),
    )
    .await?;
    print_characters(&AppState::from_persisted(persisted));
    storage.close().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_test_utils::fixtures;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse_command("  hello there "), Command::Say("hello there".into()));
    }

    #[test]
    fn slash_commands_parse() {
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("/open Mina"), Command::Open("Mina".into()));
        assert_eq!(
            parse_command("/new Rin | a quiet librarian"),
            Command::New {
                name: "Rin".into(),
                prompt: "a quiet librarian".into()
            }
        );
        assert_eq!(
            parse_command("/image cat.png look at this"),
            Command::Image {
                path: "cat.png".into(),
                caption: "look at this".into()
            }
        );
        assert_eq!(
            parse_command("/set proactive on"),
            Command::Set {
                key: "proactive".into(),
                value: "on".into()
            }
        );
        assert!(matches!(parse_command("/open"), Command::Unknown(_)));
        assert!(matches!(parse_command("/new Rin"), Command::Unknown(_)));
    }

    #[test]
    fn characters_resolve_by_name_or_id() {
        let mina = fixtures::character("Mina");
        let state = AppState::from_persisted(fixtures::persisted(
            fixtures::settings(),
            vec![mina.clone(), fixtures::character("Rin")],
        ));
        assert_eq!(resolve_character(&state, "mina").map(|c| &c.id), Some(&mina.id));
        assert_eq!(resolve_character(&state, &mina.id.0).map(|c| &c.id), Some(&mina.id));
        assert!(resolve_character(&state, "nobody").is_none());
    }

    #[test]
    fn image_types_from_extension() {
        assert_eq!(mime_for_path(Path::new("a/cat.PNG")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("dog.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
        assert_eq!(mime_for_path(Path::new("noext")), None);
    }

    #[test]
    fn switches_parse() {
        assert!(parse_switch("ON").unwrap());
        assert!(!parse_switch("off").unwrap());
        assert!(parse_switch("maybe").unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn image_file_becomes_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let item = load_image(path.to_str().unwrap()).await.unwrap();
        assert_eq!(item.mime_type, "image/png");
        assert_eq!(item.name, "pic.png");
        assert_eq!(persona_prompt::data_url_payload_len(&item.data_url), Some(3));
    }
}
