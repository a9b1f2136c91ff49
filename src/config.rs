//! Configuration management with YAML support

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::workspace::WritePolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub writes: WritesConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Inference backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Where the selected session id is kept
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_selection_path")]
    pub path: String,
}

/// Failure handling for non-critical writes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WritesConfig {
    #[serde(default)]
    pub non_critical: WritePolicy,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/authorchat/authorchat.db".to_string()
}

fn default_selection_path() -> String {
    "~/.local/share/authorchat/session_id".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            path: default_selection_path(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./authorchat.yaml (current directory)
    /// 3. ~/.config/authorchat/authorchat.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "authorchat.yaml".to_string(),
            shellexpand::tilde("~/.config/authorchat/authorchat.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Like [`Config::load`], but a missing or unreadable config falls back
    /// to defaults with a warning.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "failed to load config, using defaults");
                Config::default()
            }
        }
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).to_string())
    }

    pub fn selection_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.selection.path).to_string())
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.backend_timeout(), Duration::from_secs(120));
        assert_eq!(config.writes.non_critical, WritePolicy::LogAndContinue);
        assert!(config.database_path().ends_with("authorchat/authorchat.db"));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
database:
  path: /tmp/authorchat/test.db

backend:
  base_url: https://chat.example.com
  timeout_secs: 30

writes:
  non_critical: strict
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/authorchat/test.db"));
        assert_eq!(config.backend.base_url, "https://chat.example.com");
        assert_eq!(config.backend_timeout(), Duration::from_secs(30));
        assert_eq!(config.writes.non_critical, WritePolicy::Strict);
        // Unset sections keep their defaults
        assert!(config.selection_path().ends_with("authorchat/session_id"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/authorchat.yaml").unwrap();
        assert_eq!(config.backend.timeout_secs, 120);
    }

    #[test]
    fn test_invalid_policy_is_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("authorchat.yaml");
        std::fs::write(&path, "writes:\n  non_critical: strcit\n").unwrap();
        let path = path.to_string_lossy().to_string();

        assert!(Config::load(&path).is_err());
        let config = Config::load_or_default(&path);
        assert_eq!(config.writes.non_critical, WritePolicy::LogAndContinue);
    }
}
