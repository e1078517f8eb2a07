//! Settings schema definitions.
//!
//! All types derive Serde traits for deserialization from settings files.

use serde::{Deserialize, Serialize};

/// Root settings for the configuration engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineSettings {
    /// Store and snapshot-history settings.
    pub store: StoreSettings,

    /// Derived-value cache settings.
    pub cache: CacheSettings,

    /// Hot-reload settings.
    pub reload: ReloadSettings,

    /// Observability settings.
    pub observability: ObservabilitySettings,
}

/// Configuration store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Maximum number of retained snapshots (FIFO eviction beyond this).
    pub history_capacity: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            history_capacity: 10,
        }
    }
}

/// Cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of entries before LRU eviction.
    pub capacity: usize,

    /// Default entry time-to-live in milliseconds.
    pub default_ttl_ms: u64,

    /// Optional path for the persisted cache snapshot.
    pub persistence_path: Option<String>,

    /// How often the background flush writes dirty state, in milliseconds.
    pub flush_interval_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            default_ttl_ms: 300_000,
            persistence_path: None,
            flush_interval_ms: 1000,
        }
    }
}

/// Hot-reload settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadSettings {
    /// Debounce window per source in milliseconds; only the last change in
    /// a burst triggers a reload.
    pub debounce_ms: u64,

    /// Default poll interval for remote sources in milliseconds.
    pub remote_poll_interval_ms: u64,

    /// Timeout for a single remote fetch in milliseconds.
    pub fetch_timeout_ms: u64,

    /// Files to watch, by path. Each becomes a reload source named after
    /// its file stem.
    pub watch_paths: Vec<String>,

    /// Remote endpoints to poll.
    pub remote_sources: Vec<RemoteSourceSettings>,
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            remote_poll_interval_ms: 30_000,
            fetch_timeout_ms: 5_000,
            watch_paths: Vec::new(),
            remote_sources: Vec::new(),
        }
    }
}

/// One polled remote configuration source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteSourceSettings {
    /// Unique source identifier.
    pub id: String,

    /// Endpoint URL returning a JSON configuration document.
    pub url: String,

    /// Per-source poll interval; the global default applies when unset.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
