// crates/hearsay-daemon/src/config.rs
//
// Runtime configuration for the Hearsay daemon.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;

use hearsay_p2p::NetworkConfig;
use hearsay_reputation::TrustConfig;

/// Which backend holds assertions, users and onboarding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Rocksdb,
    /// Nothing survives a restart.
    Memory,
}

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Directory for local data storage (RocksDB).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Path of the persisted node identity (JSON keypair).
    #[serde(default = "default_identity_path")]
    pub identity_path: String,

    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_storage")]
    pub storage: StorageBackend,

    /// Seconds between reputation recomputations. Default: 300.
    #[serde(default = "default_consensus_interval_secs")]
    pub consensus_interval_secs: u64,

    /// Seconds between cache and peer pruning passes. Default: 60.
    #[serde(default = "default_housekeeping_interval_secs")]
    pub housekeeping_interval_secs: u64,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub trust: TrustConfig,
}

fn default_data_dir() -> String {
    "~/.hearsay/data".to_string()
}

fn default_identity_path() -> String {
    "~/.hearsay/node_identity.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage() -> StorageBackend {
    StorageBackend::Rocksdb
}

fn default_consensus_interval_secs() -> u64 {
    300
}

fn default_housekeeping_interval_secs() -> u64 {
    60
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            identity_path: default_identity_path(),
            log_level: default_log_level(),
            storage: default_storage(),
            consensus_interval_secs: default_consensus_interval_secs(),
            housekeeping_interval_secs: default_housekeeping_interval_secs(),
            network: NetworkConfig::default(),
            trust: TrustConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(expand_tilde(path))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: DaemonConfig = toml::from_str(contents)?;
        Ok(config)
    }
}

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
