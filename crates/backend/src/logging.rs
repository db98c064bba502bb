//! Logging setup for hosts that do not install their own subscriber

use tracing_subscriber::EnvFilter;

use crate::domain::config::LoggingConfig;

/// Parse log level from config string
fn parse_log_level(level: &str) -> tracing::Level {
  match level.to_lowercase().as_str() {
    "off" | "error" => tracing::Level::ERROR,
    "warn" => tracing::Level::WARN,
    "info" => tracing::Level::INFO,
    "debug" => tracing::Level::DEBUG,
    "trace" => tracing::Level::TRACE,
    _ => tracing::Level::INFO,
  }
}

/// Install a console subscriber at the configured level.
///
/// `RUST_LOG` overrides the level. Returns `false` when a global subscriber
/// was already installed, which is left untouched.
pub fn init_logging(config: &LoggingConfig) -> bool {
  let level = parse_log_level(&config.level);

  // Build env filter (allows RUST_LOG override)
  let env_filter = EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy();

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(true)
    .try_init()
    .is_ok()
}
