use std::path::Path;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::DEFAULT_NOTICE_CAPACITY;
use super::state::DEFAULT_SESSION_ID;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const ENV_API_BASE: &str = "EASYAGENT_API_BASE";
pub const ENV_SESSION: &str = "EASYAGENT_SESSION";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub stream: StreamConfig,
    pub log: LogConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub session_id: String,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_id: DEFAULT_SESSION_ID.to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    /// Give up after this many consecutive failed reconnects. Unset retries forever.
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_initial_ms: 500,
            reconnect_max_ms: 10_000,
            max_reconnect_attempts: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct UiConfig {
    pub notice_capacity: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `EASYAGENT_*` overrides through an injectable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            self.server.base_url = base_url.trim().to_string();
        }
        if let Some(session_id) = lookup(ENV_SESSION).filter(|v| !v.trim().is_empty()) {
            self.server.session_id = session_id.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.server.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "server.base_url must be an http(s) URL, got `{base}`"
            )));
        }
        if self.server.session_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server.session_id must not be empty".to_string(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.stream.reconnect_initial_ms == 0
            || self.stream.reconnect_initial_ms > self.stream.reconnect_max_ms
        {
            return Err(ConfigError::Invalid(
                "stream.reconnect_initial_ms must be positive and not exceed reconnect_max_ms"
                    .to_string(),
            ));
        }
        if self.ui.notice_capacity == 0 {
            return Err(ConfigError::Invalid(
                "ui.notice_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml_str("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.server.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.server.session_id, "default-session");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [server]
            base_url = "https://agent.example.com"

            [stream]
            reconnect_max_ms = 30000
            max_reconnect_attempts = 5
            "#,
        )
        .expect("parse");
        assert_eq!(config.server.base_url, "https://agent.example.com");
        assert_eq!(config.server.session_id, "default-session");
        assert_eq!(config.stream.reconnect_initial_ms, 500);
        assert_eq!(config.stream.max_reconnect_attempts, Some(5));
    }

    #[test]
    fn env_overrides_apply_when_non_empty() {
        let mut config = Config::default();
        config.apply_env_with(|name| match name {
            ENV_API_BASE => Some(" http://10.0.0.2:9000 ".to_string()),
            ENV_SESSION => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.server.base_url, "http://10.0.0.2:9000");
        assert_eq!(config.server.session_id, "default-session");
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            Config::from_toml_str("[server]\nbase_url = \"ftp://x\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[stream]\nreconnect_initial_ms = 20000\nreconnect_max_ms = 100"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[server\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_reports_missing_file_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        let err = Config::load(&missing).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }
}
