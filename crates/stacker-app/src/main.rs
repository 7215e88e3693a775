//! Stacker console host - composition root.
//!
//! Wires the dialogue engine to a terminal so the whole conversation can be
//! driven from stdin:
//! 1. Load configuration from TOML (CLI flags win)
//! 2. Build the local cache, broadcaster and session store it names
//! 3. Start the session sweeper in the background
//! 4. Read lines from stdin and feed them to the engine as chat updates

mod cli;
mod console;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use stacker_core::config::{expand_home, CacheBackend, StackerConfig};
use stacker_core::types::{ChatId, MessageId, UserId};
use stacker_dialogue::{
    Broadcaster, ChannelBroadcaster, DialogueEngine, EngineSettings, InMemoryCache,
    InMemorySessionStore, JsonFileCache, LocalCache, OutboxBroadcaster, Services, SynonymTable,
    Update,
};

use cli::CliArgs;
use console::{parse_input, ConsoleChat, ConsoleInput};

const SWEEP_INTERVAL_SECS: u64 = 60;

/// Drop expired sessions periodically so abandoned chats do not pile up.
async fn session_sweeper(sessions: Arc<InMemorySessionStore>) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
    loop {
        interval.tick().await;
        match sessions.purge_expired() {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "Expired sessions purged"),
            Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
        }
    }
}

/// Log every event a live consumer would receive.
async fn event_logger(mut rx: tokio::sync::broadcast::Receiver<stacker_core::DomainEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => tracing::info!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                actor = %event.actor_user_id,
                "Event broadcast"
            ),
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Event logger lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Point the outbox and cache under an overridden data directory.
fn rebase_data_dir(config: &mut StackerConfig, data_dir: String) {
    let base = PathBuf::from(&data_dir);
    config.broadcast.outbox_path = base.join("outbox.jsonl").to_string_lossy().to_string();
    config.cache.dir = base.join("cache").to_string_lossy().to_string();
    config.general.data_dir = data_dir;
}

fn build_cache(config: &StackerConfig) -> Arc<dyn LocalCache> {
    match config.cache.backend {
        CacheBackend::Json => {
            let dir = expand_home(&config.cache.dir);
            tracing::info!(dir = %dir.display(), "JSON snapshot cache");
            Arc::new(JsonFileCache::new(dir))
        }
        CacheBackend::Memory => {
            tracing::info!("In-memory snapshot cache");
            Arc::new(InMemoryCache::new())
        }
    }
}

fn build_broadcaster(config: &StackerConfig) -> Arc<dyn Broadcaster> {
    if config.broadcast.outbox_path.trim().is_empty() {
        let channel = ChannelBroadcaster::new();
        tokio::spawn(event_logger(channel.subscribe()));
        tracing::info!("Broadcasting to in-process subscribers");
        return Arc::new(channel);
    }
    let path = expand_home(&config.broadcast.outbox_path);
    tracing::info!(path = %path.display(), "Broadcasting to JSONL outbox");
    Arc::new(OutboxBroadcaster::new(path))
}

fn load_synonyms(config: &StackerConfig) -> SynonymTable {
    let path = config.dialogue.synonym_path.trim();
    if path.is_empty() {
        return SynonymTable::empty();
    }
    SynonymTable::load(&expand_home(path))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = StackerConfig::load_or_default(&config_file);
    if let Some(data_dir) = args.resolve_data_dir() {
        rebase_data_dir(&mut config, data_dir);
    }

    // Tracing. Logs go to stderr so the conversation on stdout stays readable.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Stacker v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");
    config.validate()?;

    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    // Engine.
    let sessions = Arc::new(InMemorySessionStore::new(config.dialogue.session_ttl_minutes));
    let services = Services {
        sessions: sessions.clone(),
        cache: build_cache(&config),
        broadcaster: build_broadcaster(&config),
        chat: Arc::new(ConsoleChat::new()),
    };
    let mut settings = EngineSettings::from_config(&config);
    settings.today = args.today;
    let engine = DialogueEngine::new(settings, services, load_synonyms(&config));

    // === Background tasks ===

    tokio::spawn(session_sweeper(sessions));

    // === Console loop ===

    let chat_id = ChatId(args.chat_id);
    let user_id = UserId::new(args.user.clone());
    println!("Stacker siap. Ketik pesan, `/tap <data>` buat pencet tombol, `/quit` buat keluar.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next_message_id: i64 = 0;
    let mut next_callback_id: u64 = 0;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let update = match parse_input(&line) {
            ConsoleInput::Quit => break,
            ConsoleInput::Tap(data) => {
                next_callback_id += 1;
                Update::Callback {
                    chat_id,
                    user_id: user_id.clone(),
                    callback_id: format!("console-{}", next_callback_id),
                    message_id: None,
                    data: data.to_string(),
                }
            }
            ConsoleInput::Say(text) => {
                next_message_id += 1;
                Update::Message {
                    chat_id,
                    user_id: user_id.clone(),
                    message_id: MessageId(next_message_id),
                    text: text.to_string(),
                }
            }
        };
        engine.handle_update(update).await;
    }

    tracing::info!("Stacker stopped");
    Ok(())
}
