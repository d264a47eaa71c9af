use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::resolver::normalize;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub execution: ExecutionConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub commands_file: PathBuf,
    pub history_file: PathBuf,
    pub screenshot_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutionConfig {
    pub shell_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries: usize,
    // Reload the previous snapshot at startup instead of starting empty
    pub resume: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            commands_file: PathBuf::from("config").join("commands.json"),
            history_file: PathBuf::from("data").join("command_history.json"),
            screenshot_dir: PathBuf::from("screenshots"),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            shell_timeout_secs: 30,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: crate::history::DEFAULT_MAX_ENTRIES,
            resume: false,
        }
    }
}

impl Config {
    /// Read the TOML file at `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }
}

/// Load the phrase-to-shell map. Never fails: a missing file is an empty map
/// and a malformed one is logged and treated as empty.
pub fn load_custom_commands(path: &Path) -> HashMap<String, String> {
    if !path.exists() {
        return HashMap::new();
    }
    match read_custom_commands(path) {
        Ok(commands) => {
            info!(count = commands.len(), path = %path.display(), "Loaded custom commands");
            commands
        }
        Err(e) => {
            error!("Failed to load custom commands: {:#}", e);
            HashMap::new()
        }
    }
}

fn read_custom_commands(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let raw: HashMap<String, String> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(raw
        .into_iter()
        .filter_map(|(phrase, command)| normalize(&phrase).map(|key| (key, command)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("server.toml")).unwrap();
        assert_eq!(config.execution.shell_timeout_secs, 30);
        assert_eq!(config.history.max_entries, 1000);
        assert!(!config.history.resume);
        assert_eq!(config.paths.commands_file, PathBuf::from("config/commands.json"));
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(&path, "[history]\nmax_entries = 50\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.history.max_entries, 50);
        assert_eq!(config.execution.shell_timeout_secs, 30);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(&path, "[history\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn custom_commands_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_custom_commands(&dir.path().join("commands.json")).is_empty());
    }

    #[test]
    fn custom_commands_malformed_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        fs::write(&path, "[1, 2").unwrap();
        assert!(load_custom_commands(&path).is_empty());
    }

    #[test]
    fn custom_command_keys_are_normalized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        fs::write(&path, r#"{" Open Notes ": "code ~/notes", "   ": "ignored"}"#).unwrap();
        let commands = load_custom_commands(&path);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands["open notes"], "code ~/notes");
    }
}
