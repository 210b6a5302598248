//! Configuration loading and persistence.
//!
//! Handles reading and writing the chat-stream configuration file.
//! The API token is never written to disk; it comes from the environment.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::PathBuf, time::Duration};

use crate::constants::{
    API_PREFIX, CONNECT_TIMEOUT, DEFAULT_HISTORY_PAGE_SIZE, STREAM_PATH,
};
use crate::ws::http_to_ws_scheme;

/// Configuration for the chat-stream client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// HTTP(S) base URL of the chat server, e.g. `https://chat.example.com`.
    ///
    /// The WebSocket endpoint is derived from it. Without it no stream can
    /// be opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// API token - NOT serialized to disk.
    #[serde(skip)]
    pub token: Option<String>,
    /// Milliseconds the stream transport has to become ready.
    pub connect_timeout_ms: u64,
    /// Number of messages requested per history page.
    pub history_page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            connect_timeout_ms: u64::try_from(CONNECT_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `CHAT_STREAM_CONFIG_DIR` overrides the platform config directory
    /// (Linux: `~/.config/chat-stream`).
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("CHAT_STREAM_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("chat-stream")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing or unreadable file falls back to defaults.
    pub fn load() -> Result<Self> {
        let mut config = match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Using default config: {e:#}");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config file {}", config_path.display()))
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("CHAT_STREAM_BASE_URL") {
            self.base_url = Some(base_url);
        }

        if let Ok(token) = std::env::var("CHAT_STREAM_TOKEN") {
            self.token = Some(token);
        }

        if let Ok(timeout) = std::env::var("CHAT_STREAM_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                self.connect_timeout_ms = ms;
            }
        }

        if let Ok(page_size) = std::env::var("CHAT_STREAM_HISTORY_PAGE_SIZE") {
            if let Ok(size) = page_size.parse::<u32>() {
                self.history_page_size = size;
            }
        }
    }

    /// Persists the current configuration to disk.
    /// Note: the token is never saved.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Base URL without trailing slashes, if configured and non-empty.
    fn base(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    /// URL of a REST endpoint, e.g. `api_url("messages")`.
    pub fn api_url(&self, path: &str) -> Option<String> {
        self.base().map(|base| format!("{base}{API_PREFIX}{path}"))
    }

    /// WebSocket URL of the streaming endpoint.
    pub fn stream_url(&self) -> Option<String> {
        self.api_url(STREAM_PATH).map(|url| http_to_ws_scheme(&url))
    }

    /// Readiness window for the stream transport.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, None);
        assert_eq!(config.connect_timeout(), Duration::from_secs(15));
        assert_eq!(config.history_page_size, 20);
        assert_eq!(config.stream_url(), None);
    }

    #[test]
    fn test_config_serialization_excludes_token() {
        let config = Config {
            token: Some("secret_token".to_string()),
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();

        assert!(!json.contains("secret_token"));
        assert!(!json.contains("token"));
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"base_url":"http://localhost:8000"}"#).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.history_page_size, 20);
    }

    #[test]
    fn test_stream_url_matches_scheme() {
        let secure = Config {
            base_url: Some("https://chat.example.com/".to_string()),
            ..Config::default()
        };
        assert_eq!(
            secure.stream_url().as_deref(),
            Some("wss://chat.example.com/api/v1/ws/messages")
        );

        let local = Config {
            base_url: Some("http://localhost:8000".to_string()),
            ..Config::default()
        };
        assert_eq!(
            local.stream_url().as_deref(),
            Some("ws://localhost:8000/api/v1/ws/messages")
        );
    }

    #[test]
    fn test_empty_base_url_counts_as_missing() {
        let config = Config {
            base_url: Some(String::new()),
            ..Config::default()
        };
        assert_eq!(config.stream_url(), None);
        assert_eq!(config.api_url("messages"), None);
    }

    #[test]
    fn test_api_url() {
        let config = Config {
            base_url: Some("http://localhost:8000".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.api_url("attachments/upload").as_deref(),
            Some("http://localhost:8000/api/v1/attachments/upload")
        );
    }
}
