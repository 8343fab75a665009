//! Configuration schema for Corral
//!
//! Configuration is stored at `~/.config/corral/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Resource store settings
    pub store: StoreConfig,

    /// REST server settings
    pub server: ServerConfig,

    /// Build cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable audit logging
    pub audit_log: bool,

    /// Namespace used when a command does not name one
    pub namespace: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
            namespace: "workspace".to_string(),
        }
    }
}

/// Which resource store backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON files under the state directory
    File,
    /// Process-local, lost on exit
    Memory,
}

/// Resource store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to use
    pub backend: StoreBackend,

    /// Override for the state directory (defaults to the platform state dir)
    pub state_dir: Option<PathBuf>,

    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,

    /// Attempts for transient failures (including the first)
    pub max_attempts: u32,

    /// First backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Backoff ceiling in milliseconds
    pub max_backoff_ms: u64,

    /// Re-read/re-merge attempts when a versioned write conflicts
    pub conflict_retries: u32,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            state_dir: None,
            timeout_ms: 5_000,
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
            conflict_retries: 5,
        }
    }
}

/// REST server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8030".to_string(),
        }
    }
}

/// Build cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Caches idle longer than this are cleanup candidates
    pub stale_days: u32,

    /// Only remove caches whose application is gone
    pub check_app_exists: bool,

    /// Run a cleanup sweep every N hours while serving (0 = disabled)
    pub sweep_interval_hours: u32,

    /// Volume size used when an application does not request one
    pub default_size: String,

    /// Storage class used when an application does not request one
    pub storage_class: Option<String>,

    /// Recreate bound volumes whose spec no longer matches
    pub recreate_on_mismatch: bool,

    /// Concurrent deletions during a sweep
    pub sweep_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_days: 30,
            check_app_exists: true,
            sweep_interval_hours: 0,
            default_size: "1Gi".to_string(),
            storage_class: None,
            recreate_on_mismatch: true,
            sweep_concurrency: 4,
        }
    }
}
