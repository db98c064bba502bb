//! Configuration for the marker engine.
//!
//! Every section is defaulted, so an empty or partial TOML file is valid.
//! Config priority: explicit path > user (~/.config/unseen/config.toml) > defaults

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Parse error: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("Invalid configuration: {0}")]
  Invalid(String),
}

// ============================================================================
// Lane Configuration
// ============================================================================

/// Background lane that executes fan-out and removal jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
  /// Lane name, used in logs
  pub name: String,
  /// Bounded job queue size
  pub capacity: usize,
}

impl Default for LaneConfig {
  fn default() -> Self {
    Self {
      name: "file_marker".to_string(),
      capacity: 1024,
    }
  }
}

// ============================================================================
// Cache Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Maximum number of cached `(user, folder)` counters
  pub max_capacity: u64,
  /// Upper bound on how long a counter may be served without a write-through miss
  pub ttl_secs: u64,
  /// Lifetime of cached well-known root ids
  pub root_ttl_secs: u64,
  /// Invalidation events buffered per subscriber before it lags
  pub invalidation_buffer: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_capacity: 100_000,
      ttl_secs: 300,
      root_ttl_secs: 3600,
      invalidation_buffer: 1024,
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }

  pub fn root_ttl(&self) -> Duration {
    Duration::from_secs(self.root_ttl_secs)
  }
}

// ============================================================================
// Notification Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
  /// Maximum tags per push call
  pub batch_size: usize,
  /// Pending batches before new ones are dropped
  pub buffer: usize,
}

impl Default for NotifyConfig {
  fn default() -> Self {
    Self {
      batch_size: 1000,
      buffer: 256,
    }
  }
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Default level ("error", "warn", "info", "debug", "trace"); RUST_LOG overrides
  pub level: String,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
    }
  }
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub lane: LaneConfig,
  pub cache: CacheConfig,
  pub notify: NotifyConfig,
  pub logging: LoggingConfig,
}

impl Config {
  /// Parse and validate a TOML document
  pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Load from a file. A missing file yields the defaults.
  pub async fn load(path: &Path) -> Result<Self, ConfigError> {
    match tokio::fs::read_to_string(path).await {
      Ok(content) => Self::from_toml_str(&content),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
      Err(e) => Err(e.into()),
    }
  }

  /// Load the user config, falling back to defaults when it is absent or broken
  pub async fn load_global() -> Self {
    let Some(path) = Self::user_config_path() else {
      return Self::default();
    };

    match Self::load(&path).await {
      Ok(config) => config,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "Ignoring unusable config file");
        Self::default()
      }
    }
  }

  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("UNSEEN_CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }

    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("unseen").join("config.toml"));
    }

    dirs::config_dir().map(|p: PathBuf| p.join("unseen").join("config.toml"))
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.lane.capacity == 0 {
      return Err(ConfigError::Invalid("lane.capacity must be greater than zero".to_string()));
    }
    if self.notify.batch_size == 0 {
      return Err(ConfigError::Invalid("notify.batch_size must be greater than zero".to_string()));
    }
    if self.notify.buffer == 0 {
      return Err(ConfigError::Invalid("notify.buffer must be greater than zero".to_string()));
    }
    if self.cache.invalidation_buffer == 0 {
      return Err(ConfigError::Invalid(
        "cache.invalidation_buffer must be greater than zero".to_string(),
      ));
    }
    Ok(())
  }
}
