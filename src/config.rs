use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub storage: StorageConfig,

    pub runtime: RuntimeConfig,

    pub cache: CacheConfig,

    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the shared database and the per-user shards.
    pub data_dir: String,

    /// Maximum connections per SQLite pool (default: 5)
    pub max_connections: u32,

    /// Minimum connections per SQLite pool (default: 1)
    pub min_connections: u32,

    /// How long a connection waits on a locked database file before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "database".to_string(),
            max_connections: 5,
            min_connections: 1,
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory holding session and command marker files.
    pub runtime_dir: String,

    /// Seconds between session heartbeats (default: 30)
    pub heartbeat_interval_secs: u64,

    /// Seconds between polls of the command directory (default: 10)
    pub command_poll_interval_secs: u64,

    /// Sessions whose file is older than this are considered dead (default: 120)
    pub session_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_dir: ".runtime/ordesk".to_string(),
            heartbeat_interval_secs: 30,
            command_poll_interval_secs: 10,
            session_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached record listings (default: 512)
    pub listing_capacity: u64,

    /// Maximum cached aggregates and distinct-value lists (default: 256)
    pub stats_capacity: u64,

    /// Maximum cached billing-period lists (default: 128)
    pub period_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_capacity: 512,
            stats_capacity: 256,
            period_capacity: 128,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Days between automatic ANALYZE / PRAGMA optimize runs (default: 7)
    pub optimize_interval_days: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            optimize_interval_days: 7,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            storage: StorageConfig::default(),
            runtime: RuntimeConfig::default(),
            cache: CacheConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("ordesk").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".ordesk").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.max_connections == 0 {
            anyhow::bail!("Storage pool needs at least one connection");
        }

        if self.storage.min_connections > self.storage.max_connections {
            anyhow::bail!("Minimum pool size cannot exceed the maximum");
        }

        if self.runtime.session_timeout_secs <= self.runtime.heartbeat_interval_secs {
            anyhow::bail!("Session timeout must exceed the heartbeat interval");
        }

        Ok(())
    }
}
