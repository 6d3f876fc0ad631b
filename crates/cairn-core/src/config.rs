//! Configuration system for cairn.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CAIRN_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/cairn/config.toml
//!   3. ~/.config/cairn/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::principal::Principal;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CairnConfig {
    pub network: NetworkConfig,
    pub discovery: DiscoveryConfig,
    pub broadcast: BroadcastConfig,
    /// Seed records for the in-memory user store of the stock daemon.
    pub users: Vec<Principal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// WebSocket port. 0 = OS-assigned; the assigned port is what gets announced.
    pub ws_port: u16,
    /// Local status API port (always bound on 127.0.0.1).
    pub api_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Base URL of the rendezvous registry (grape HTTP endpoint).
    pub grape_url: String,
    /// Service names. Each one is announced as `<name>:ws`.
    pub services: Vec<String>,
    /// Re-announcement period in milliseconds.
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Per-session handler timeout in milliseconds. 0 = wait forever.
    pub handler_timeout_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_WS_PORT: u16 = 13381;
pub const DEFAULT_API_PORT: u16 = 13382;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 45_000;

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            ws_port: DEFAULT_WS_PORT,
            api_port: DEFAULT_API_PORT,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            grape_url: "http://127.0.0.1:30001".to_string(),
            services: vec!["rest:cairn:api".to_string()],
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl DiscoveryConfig {
    /// Re-announcement period. Zero falls back to the default.
    pub fn tick_interval(&self) -> Duration {
        match self.tick_interval_ms {
            0 => Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            ms => Duration::from_millis(ms),
        }
    }

    /// Keys published to the registry, one per configured service.
    pub fn announce_keys(&self) -> Vec<String> {
        self.services.iter().map(|s| format!("{s}:ws")).collect()
    }
}

impl BroadcastConfig {
    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_ms > 0).then(|| Duration::from_millis(self.handler_timeout_ms))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("cairn")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl CairnConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            CairnConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CAIRN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&CairnConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply CAIRN_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CAIRN_NETWORK__BIND_ADDR") {
            self.network.bind_addr = v;
        }
        if let Some(p) = lookup("CAIRN_NETWORK__WS_PORT").and_then(|v| v.parse().ok()) {
            self.network.ws_port = p;
        }
        if let Some(p) = lookup("CAIRN_NETWORK__API_PORT").and_then(|v| v.parse().ok()) {
            self.network.api_port = p;
        }
        if let Some(v) = lookup("CAIRN_DISCOVERY__GRAPE_URL") {
            self.discovery.grape_url = v;
        }
        if let Some(v) = lookup("CAIRN_DISCOVERY__SERVICES") {
            self.discovery.services = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(ms) = lookup("CAIRN_DISCOVERY__TICK_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.discovery.tick_interval_ms = ms;
        }
        if let Some(ms) = lookup("CAIRN_BROADCAST__HANDLER_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.broadcast.handler_timeout_ms = ms;
        }
    }
}
