//! Bridge configuration — file persistence plus environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Environment variable naming the directory that holds `config.json`.
pub const CONFIG_DIR_ENV: &str = "CHATBRIDGE_CONFIG_DIR";

/// Persisted bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token embedded in the socket URI. Passed through opaquely.
    #[serde(default = "default_token")]
    pub token: String,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_context_messages")]
    pub context_messages: usize,
    #[serde(default = "default_initial_capture_ms")]
    pub initial_capture_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Path to config file (not serialized).
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    5577
}
fn default_token() -> String {
    "supersecret123".into()
}
fn default_reconnect_base_ms() -> u64 {
    1000
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_debounce_ms() -> u64 {
    1000
}
fn default_context_messages() -> usize {
    6
}
fn default_initial_capture_ms() -> u64 {
    2000
}
fn default_channel_capacity() -> usize {
    64
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            token: default_token(),
            reconnect_base_ms: default_reconnect_base_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            debounce_ms: default_debounce_ms(),
            context_messages: default_context_messages(),
            initial_capture_ms: default_initial_capture_ms(),
            channel_capacity: default_channel_capacity(),
            config_path: PathBuf::new(),
        }
    }
}

impl BridgeConfig {
    /// Load config from `config.json` in the given directory, or return defaults.
    pub fn load(config_dir: &Path) -> Self {
        let config_path = config_dir.join("config.json");
        let mut config: BridgeConfig = match std::fs::read_to_string(&config_path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", config_path.display(), e);
                BridgeConfig::default()
            }),
            Err(_) => BridgeConfig::default(),
        };
        config.config_path = config_path;
        config
    }

    /// Build configuration from the config directory and process environment.
    pub fn from_env() -> Result<Self> {
        let config_dir = std::env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));
        let mut config = Self::load(&config_dir);
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `CHATBRIDGE_HOST`, `CHATBRIDGE_PORT` and `CHATBRIDGE_TOKEN` overrides.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("CHATBRIDGE_HOST").filter(|h| !h.is_empty()) {
            self.host = host;
        }
        if let Some(port) = lookup("CHATBRIDGE_PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => warn!("Ignoring invalid CHATBRIDGE_PORT: {}", port),
            }
        }
        if let Some(token) = lookup("CHATBRIDGE_TOKEN") {
            self.token = token;
        }
        debug!("Bridge endpoint {}:{}", self.host, self.port);
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".into()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channelCapacity must be at least 1".into()));
        }
        if self.context_messages == 0 {
            return Err(Error::Config("contextMessages must be at least 1".into()));
        }
        Ok(())
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.config_path, json)?;
        Ok(())
    }

    /// Socket endpoint: `ws://<host>:<port>/ws?token=<bearer>`.
    pub fn socket_url(&self) -> Result<String> {
        let base = format!("ws://{}:{}/ws", self.host, self.port);
        url::Url::parse_with_params(&base, &[("token", self.token.as_str())])
            .map(String::from)
            .map_err(|e| Error::Config(format!("invalid socket url {}: {}", base, e)))
    }

    /// Health endpoint of the external bridge process.
    pub fn health_url(&self) -> String {
        format!("http://{}:{}/health", self.host, self.port)
    }

    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn initial_capture_delay(&self) -> Duration {
        Duration::from_millis(self.initial_capture_ms)
    }
}
