//! Runtime configuration for roomsync.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! Freshness windows, prefetch thresholds and storage knobs all live here.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "roomsync", about = "Cache-aside sync and discover prefetch for roommate matching")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "roomsync.json")]
    pub config: PathBuf,

    /// Override the remote API base URL.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show one property, from cache when fresh.
    Property {
        id: String,
        /// Skip the cache and refetch.
        #[arg(long)]
        force: bool,
    },
    /// List a seeker's matches.
    Matches {
        seeker_id: String,
        #[arg(long)]
        force: bool,
    },
    /// Run a discover session, swiping through candidates.
    Discover {
        seeker_id: String,
        /// Number of cards to swipe before stopping.
        #[arg(long, default_value_t = 10)]
        swipes: usize,
        /// Like every card instead of passing.
        #[arg(long)]
        like: bool,
    },
    /// Drop every cached payload and freshness record.
    Clear,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API settings.
    pub remote: RemoteConfig,

    /// Freshness policy.
    pub cache: CacheConfig,

    /// Discover queue tuning.
    pub prefetch: PrefetchConfig,

    /// Local persistence.
    pub storage: StorageConfig,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the matching API (e.g. "https://api.example.com/v1").
    pub base_url: String,

    /// Per-request timeout in milliseconds. A timeout is reported like any other remote failure.
    pub request_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// When a scoped (owner/seeker) read goes back to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopedRefreshPolicy {
    /// Refresh when forced or when every cached member is fresh.
    #[default]
    WhenFresh,
    /// Refresh when forced, when any cached member is stale, or when the
    /// scope has nothing cached.
    WhenStale,
}

/// Freshness policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum age of a cached entity before it is refetched, in milliseconds.
    pub default_max_age_ms: u64,

    pub scoped_refresh: ScopedRefreshPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_max_age_ms: 300_000, // 5 minutes
            scoped_refresh: ScopedRefreshPolicy::WhenFresh,
        }
    }
}

impl CacheConfig {
    pub fn default_max_age(&self) -> Duration {
        Duration::from_millis(self.default_max_age_ms)
    }
}

/// Discover queue tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Candidates requested per page.
    pub page_size: usize,

    /// Refill when the buffer holds this many candidates or fewer.
    pub low_water_mark: usize,
}

impl PrefetchConfig {
    /// A page size of zero would read as an empty page and end the queue.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.page_size > 0, "prefetch.page_size must be at least 1");
        Ok(())
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            page_size: 5,
            low_water_mark: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Disk,
}

/// Local persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Root directory for the disk backend.
    pub data_dir: PathBuf,

    /// Apply zstd compression to payload files.
    pub compress: bool,

    /// zstd compression level (1-22).
    pub zstd_level: i32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Disk,
            data_dir: PathBuf::from(".roomsync"),
            compress: true,
            zstd_level: 3,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            config.prefetch.validate()?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}
