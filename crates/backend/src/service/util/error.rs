//! Error type shared by the marker service and the engine.

use crate::{actor::handle::SendError, domain::config::ConfigError, store::StoreError};

/// Unified error type for marker operations.
#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
  /// A store call failed.
  #[error("Store error: {0}")]
  Store(#[from] StoreError),
  /// Entry does not exist.
  #[error("{item_type} not found: {id}")]
  NotFound { item_type: &'static str, id: String },
  /// Input that cannot be placed in the tree (file without a parent, broken ancestor chain).
  #[error("Inconsistent entry: {0}")]
  Inconsistent(String),
  /// The background lane is gone.
  #[error("Queue error: {0}")]
  Queue(#[from] SendError),
  #[error("Configuration error: {0}")]
  Config(#[from] ConfigError),
}

impl MarkerError {
  /// Create a not-found error.
  pub fn not_found(item_type: &'static str, id: impl Into<String>) -> Self {
    Self::NotFound {
      item_type,
      id: id.into(),
    }
  }

  /// Create an inconsistent-input error.
  pub fn inconsistent(msg: impl Into<String>) -> Self {
    Self::Inconsistent(msg.into())
  }

  /// Whether retrying later could succeed
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Store(e) => e.is_transient(),
      _ => false,
    }
  }
}
