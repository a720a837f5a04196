use ballotbox_core::suggest::SuggesterConfig;
use ballotbox_core::{AppConfig, DuplicateVotePolicy, VoteSettings, WinnerPolicy};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SUGGEST_API_KEY_ENV: &str = "BALLOTBOX_SUGGEST_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub voting: VotingConfig,
    pub suggestions: SuggesterConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub public_url: Option<String>,
    pub trust_proxy: bool,
    pub seed_demo: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            public_url: None,
            trust_proxy: false,
            seed_demo: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: "sqlite://./data/ballotbox.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    pub duplicate_policy: DuplicateVotePolicy,
    pub max_proxy_headers: Option<usize>,
    pub winner_policy: WinnerPolicy,
}

impl Config {
    /// Load configuration from `path`.
    ///
    /// A missing file yields defaults. The suggestion API key may come from
    /// the environment instead of the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?
        } else {
            Config::default()
        };

        config.apply_api_key_override(std::env::var(SUGGEST_API_KEY_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_api_key_override(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.suggestions.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "server.bind_address '{}' is not a socket address",
                    self.server.bind_address
                ),
            });
        }
        if self.storage.backend == StorageBackend::Sqlite && self.storage.database_url.is_empty()
        {
            return Err(ConfigError::ValidationError {
                message: "storage.database_url is required for the sqlite backend".to_string(),
            });
        }
        if self.storage.max_connections == 0 {
            return Err(ConfigError::ValidationError {
                message: "storage.max_connections must be at least 1".to_string(),
            });
        }
        if self.suggestions.enabled {
            if self.suggestions.endpoint.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "suggestions.endpoint is required when suggestions are enabled"
                        .to_string(),
                });
            }
            if self.suggestions.timeout_ms == 0 {
                return Err(ConfigError::ValidationError {
                    message: "suggestions.timeout_ms must be positive".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            voting: VoteSettings {
                duplicate_policy: self.voting.duplicate_policy,
                max_proxy_headers: self.voting.max_proxy_headers,
            },
            winner_policy: self.voting.winner_policy,
            trust_proxy: self.server.trust_proxy,
            public_url: self
                .server
                .public_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
        }
    }
}
