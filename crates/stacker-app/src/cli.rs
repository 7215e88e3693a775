//! CLI argument definitions for the Stacker console host.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// Stacker: log money, tasks and projects by chatting.
#[derive(Parser, Debug)]
#[command(name = "stacker", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory for the outbox, cache snapshots and synonyms.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// User the console session speaks as.
    #[arg(short = 'u', long = "user", default_value = "console")]
    pub user: String,

    /// Chat id the console session uses.
    #[arg(long = "chat-id", default_value_t = 1)]
    pub chat_id: i64,

    /// Pin "today" (YYYY-MM-DD) for relative dates such as "besok".
    #[arg(long = "today")]
    pub today: Option<NaiveDate>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > STACKER_CONFIG env var > ~/.stacker/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("STACKER_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Data directory override, if any.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Log level: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".stacker").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".stacker").join("config.toml");
    }
    PathBuf::from("config.toml")
}
