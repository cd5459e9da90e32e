//! Configuration system for the distributed ARP table.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $DAT_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/meshdat/config.toml
//!   3. ~/.config/meshdat/config.toml

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::addr::HwAddr;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatConfig {
    pub cache: CacheConfig,
    pub dht: DhtConfig,
    pub node: NodeConfig,
    /// Statically known mesh participants. Only the daemon reads this; a
    /// routing protocol would normally supply the node set.
    pub peers: Vec<PeerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries not refreshed within this window are purged.
    pub entry_timeout_secs: u64,
    /// How often the purge sweep runs.
    pub purge_interval_secs: u64,
    /// Fixed bucket count of the local table. Never resized.
    pub buckets: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DhtConfig {
    /// Number of candidates each key is replicated to.
    pub candidates: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Our own hardware address, used as the frame source.
    pub hw_addr: HwAddr,
    /// UDP address the daemon binds to.
    pub listen: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub hw_addr: HwAddr,
    /// Where frames for this peer are sent.
    pub addr: SocketAddr,
    /// Pin the ring position instead of deriving it from `hw_addr`.
    #[serde(default)]
    pub ring_addr: Option<u32>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Bucket count of the local table.
pub const DEFAULT_BUCKETS: usize = 1024;

/// Purge sweep period in seconds.
pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 10;

/// Entry timeout in seconds (five minutes).
pub const DEFAULT_ENTRY_TIMEOUT_SECS: u64 = 300;

/// Candidates per key.
pub const DEFAULT_CANDIDATES: usize = 3;

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_timeout_secs: DEFAULT_ENTRY_TIMEOUT_SECS,
            purge_interval_secs: DEFAULT_PURGE_INTERVAL_SECS,
            buckets: DEFAULT_BUCKETS,
        }
    }
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            hw_addr: HwAddr::ZERO,
            listen: SocketAddr::from(([0, 0, 0, 0], 4305)),
        }
    }
}

impl CacheConfig {
    pub fn entry_timeout(&self) -> Duration {
        Duration::from_secs(self.entry_timeout_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("meshdat")
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
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl DatConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit path, falling back to defaults if it is absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            DatConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("DAT_CONFIG")
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
            let text = toml::to_string_pretty(&DatConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject values the table cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.buckets == 0 {
            return Err(ConfigError::Invalid("cache.buckets", "must be non-zero".into()));
        }
        if self.cache.purge_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache.purge_interval_secs",
                "must be non-zero".into(),
            ));
        }
        if self.dht.candidates == 0 {
            return Err(ConfigError::Invalid("dht.candidates", "must be non-zero".into()));
        }
        Ok(())
    }

    /// Apply DAT_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DAT_CACHE__ENTRY_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.cache.entry_timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("DAT_CACHE__PURGE_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.cache.purge_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("DAT_DHT__CANDIDATES") {
            if let Ok(n) = v.parse() {
                self.dht.candidates = n;
            }
        }
        if let Ok(v) = std::env::var("DAT_NODE__LISTEN") {
            if let Ok(addr) = v.parse() {
                self.node.listen = addr;
            }
        }
        if let Ok(v) = std::env::var("DAT_NODE__HW_ADDR") {
            if let Ok(hw) = v.parse() {
                self.node.hw_addr = hw;
            }
        }
    }
}
