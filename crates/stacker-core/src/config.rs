use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StackerError};
use crate::events::DEFAULT_SOURCE;

/// Top-level configuration for the Stacker bot.
///
/// Loaded from `~/.stacker/config.toml` by default. Every section falls back
/// to its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackerConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub dialogue: DialogueConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl StackerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StackerConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| StackerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.dialogue.session_ttl_minutes == 0 {
            return Err(StackerError::Config(
                "dialogue.session_ttl_minutes must be greater than 0".to_string(),
            ));
        }
        if self.dialogue.transactions_per_page == 0 {
            return Err(StackerError::Config(
                "dialogue.transactions_per_page must be greater than 0".to_string(),
            ));
        }
        if self.broadcast.timeout_ms == 0 {
            return Err(StackerError::Config(
                "broadcast.timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.broadcast.source_tag.trim().is_empty() {
            return Err(StackerError::Config(
                "broadcast.source_tag must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory for the outbox, cache snapshots and the synonym file.
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: "~/.stacker/data".to_string(),
        }
    }
}

/// Dialogue engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Minutes of inactivity after which a pending request expires.
    pub session_ttl_minutes: u64,
    /// Inbound messages longer than this are rejected.
    pub max_message_length: usize,
    /// Rows shown per page in the transaction list view.
    pub transactions_per_page: usize,
    /// Path to the course keyword/synonym JSON file. Empty disables it.
    pub synonym_path: String,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: 15,
            max_message_length: 2000,
            transactions_per_page: 5,
            synonym_path: String::new(),
        }
    }
}

/// Event delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Origin tag written into every event.
    pub source_tag: String,
    /// JSON-lines file receiving events when no live subscriber is attached.
    pub outbox_path: String,
    /// Longest wait for a broadcast before the reply goes out as offline.
    pub timeout_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            source_tag: DEFAULT_SOURCE.to_string(),
            outbox_path: "~/.stacker/data/outbox.jsonl".to_string(),
            timeout_ms: 2000,
        }
    }
}

/// Which local cache backend holds per-user snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Json,
}

/// Local cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Directory holding one JSON snapshot per user (json backend only).
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            dir: "~/.stacker/data/cache".to_string(),
        }
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> std::path::PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        return std::path::PathBuf::from(home).join(rest);
    }
    std::path::PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StackerConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.dialogue.session_ttl_minutes, 15);
        assert_eq!(config.dialogue.max_message_length, 2000);
        assert_eq!(config.dialogue.transactions_per_page, 5);
        assert_eq!(config.broadcast.source_tag, "telegram");
        assert_eq!(config.broadcast.timeout_ms, 2000);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_section_defaults() {
        let config: StackerConfig = toml::from_str(
            r#"
            [dialogue]
            session_ttl_minutes = 30

            [cache]
            backend = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.dialogue.session_ttl_minutes, 30);
        assert_eq!(config.dialogue.transactions_per_page, 5);
        assert_eq!(config.cache.backend, CacheBackend::Json);
        assert_eq!(config.broadcast.source_tag, "telegram");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = StackerConfig::default();
        config.dialogue.synonym_path = "/tmp/matkul.json".to_string();
        config.save(&path).unwrap();

        let loaded = StackerConfig::load(&path).unwrap();
        assert_eq!(loaded.dialogue.synonym_path, "/tmp/matkul.json");
    }

    #[test]
    fn test_load_rejects_zero_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dialogue]\nsession_ttl_minutes = 0\n").unwrap();

        let err = StackerConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("session_ttl_minutes"));
    }

    #[test]
    fn test_load_rejects_zero_broadcast_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[broadcast]\ntimeout_ms = 0\n").unwrap();

        let err = StackerConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StackerConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config.dialogue.session_ttl_minutes, 15);
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(
            expand_home("/var/lib/stacker"),
            std::path::PathBuf::from("/var/lib/stacker")
        );
        assert!(!expand_home("~/x").to_string_lossy().starts_with('~'));
    }
}
