use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::codec::Aliases;
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Protocol configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Prefix for every shared-store key
    pub key_prefix: String,
    /// Slot pool size (MAX)
    pub pool_size: u32,
    /// Milliseconds per time tick
    pub tick_ms: u64,
    /// Approximate per-slot byte ceiling
    pub slot_capacity_bytes: usize,
    /// Slots with fewer coarse gestures are deleted instead of archived
    pub delete_threshold: u32,
    /// Time-to-live of slot writes
    pub slot_ttl: Duration,
    /// Time-to-live of epoch record writes
    pub epoch_ttl: Duration,
    /// Collector endpoint (None = no network transport configured)
    pub endpoint: Option<String>,
    /// Manual aliases for spaces and actions
    pub aliases: Aliases,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_prefix: "tm".to_string(),
            pool_size: 4,
            tick_ms: 100,
            slot_capacity_bytes: 3500,
            delete_threshold: 1,
            slot_ttl: Duration::from_secs(1800),
            epoch_ttl: Duration::from_secs(1800),
            endpoint: None,
            aliases: Aliases::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlStoreConfig {
    pub key_prefix: Option<String>,
    pub pool_size: Option<u32>,
    pub slot_capacity_bytes: Option<usize>,
    pub slot_ttl_secs: Option<u64>,
    pub epoch_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlTraceConfig {
    pub tick_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlArchiveConfig {
    pub delete_threshold: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlTransportConfig {
    pub endpoint: Option<String>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub store: Option<TomlStoreConfig>,
    pub trace: Option<TomlTraceConfig>,
    pub archive: Option<TomlArchiveConfig>,
    pub transport: Option<TomlTransportConfig>,
    pub aliases: Option<Aliases>,
}

impl Config {
    /// Load configuration from the default file, merging with defaults.
    ///
    /// A missing file is created from the bundled example; an unreadable or
    /// invalid one falls back to defaults.
    pub fn load() -> Self {
        let config_file = config_path();

        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        match Self::load_from(&config_file) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to default config");
                Config::default()
            }
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let toml_config = toml::from_str::<TomlConfig>(contents)?;
        let mut config = Config::default();
        config.merge(toml_config);
        Ok(config)
    }

    fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(store) = toml_config.store {
            if let Some(prefix) = store.key_prefix.filter(|p| is_valid_prefix(p)) {
                self.key_prefix = prefix;
            }
            if let Some(pool_size) = store.pool_size {
                self.pool_size = pool_size.max(1);
            }
            if let Some(capacity) = store.slot_capacity_bytes {
                self.slot_capacity_bytes = capacity;
            }
            if let Some(secs) = store.slot_ttl_secs {
                self.slot_ttl = Duration::from_secs(secs);
            }
            if let Some(secs) = store.epoch_ttl_secs {
                self.epoch_ttl = Duration::from_secs(secs);
            }
        }

        if let Some(tick_ms) = toml_config.trace.and_then(|t| t.tick_ms) {
            self.tick_ms = tick_ms.max(1);
        }

        if let Some(threshold) = toml_config.archive.and_then(|a| a.delete_threshold) {
            self.delete_threshold = threshold;
        }

        if let Some(transport) = toml_config.transport {
            self.endpoint = transport.endpoint;
        }

        if let Some(aliases) = toml_config.aliases {
            self.aliases = aliases;
        }
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &PathBuf) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn with_slot_capacity(mut self, bytes: usize) -> Self {
        self.slot_capacity_bytes = bytes;
        self
    }

    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms.max(1);
        self
    }

    pub fn with_delete_threshold(mut self, threshold: u32) -> Self {
        self.delete_threshold = threshold;
        self
    }

    pub fn with_aliases(mut self, aliases: Aliases) -> Self {
        self.aliases = aliases;
        self
    }

    /// Key of the shared epoch record
    pub fn epoch_key(&self) -> String {
        format!("{}e", self.key_prefix)
    }

    /// Common prefix of every slot key
    pub fn slot_prefix(&self) -> String {
        format!("{}s", self.key_prefix)
    }

    /// Key holding archived payloads moved out of the pool before delivery
    pub fn backlog_key(&self) -> String {
        format!("{}b", self.key_prefix)
    }

    /// Key of slot `index` (1-based)
    pub fn slot_key(&self, index: u32) -> String {
        format!("{}{}", self.slot_prefix(), index)
    }
}

/// Prefixes must survive as plain store keys and must not contain the
/// record separator.
fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphanumeric())
}
