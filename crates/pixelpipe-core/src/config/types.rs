//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pixel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Worker threads for per-pixel operations (0 = twice the CPU count)
    pub workers: usize,
}

impl ProcessingConfig {
    /// Resolve the configured worker count, expanding 0 to the automatic value.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            available_cpus() * 2
        }
    }
}

/// Admission control for script executions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum concurrently running scripts (0 = CPU count)
    pub max_concurrent: usize,
}

impl AdmissionConfig {
    /// Resolve the configured maximum, expanding 0 to the CPU count.
    pub fn resolved_max(&self) -> usize {
        if self.max_concurrent > 0 {
            self.max_concurrent
        } else {
            available_cpus()
        }
    }
}

/// Decode cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether decoded images are cached at all
    pub enabled: bool,

    /// Age in seconds after which an entry is eligible for eviction
    pub ttl_secs: u64,

    /// Seconds between background sweeps
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 120,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum source size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Remote fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 16384,
            decode_timeout_ms: 10_000,
            fetch_timeout_ms: 30_000,
        }
    }
}

/// Snapshot server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the snapshot server binds to
    pub bind: String,

    /// Root directory for stream artifacts (empty = OS temp dir)
    pub artifact_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            artifact_dir: String::new(),
        }
    }
}

/// One continuously re-rendered stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEntry {
    /// Stream name, also used to derive the artifact location
    pub name: String,

    /// HTTP route serving the latest artifact (e.g. "/cam1.png")
    pub route: String,

    /// Seconds between renders
    pub interval_secs: u64,

    /// Path of the script file, re-read on every render
    pub script: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
