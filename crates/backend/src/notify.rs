//! Boundary to the realtime push transport
//!
//! The marker never waits on delivery. Changed tags are handed to a
//! [`NotificationEmitter`], which queues them for the notifier lane; the lane
//! chunks them and calls the host's [`NotificationSink`].

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, trace, warn};

use crate::domain::tag::Tag;

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
  #[error("Push transport unavailable: {0}")]
  Unavailable(String),
  #[error("Push rejected: {0}")]
  Rejected(String),
}

/// Delivers tag deltas to connected clients.
///
/// A tag with `count = 0` announces that the mark was removed.
#[async_trait]
pub trait NotificationSink: Send + Sync {
  async fn push_tag_deltas(&self, tags: Vec<Tag>) -> Result<(), NotifyError>;
}

/// Sink that only logs, for hosts without a push transport
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
  async fn push_tag_deltas(&self, tags: Vec<Tag>) -> Result<(), NotifyError> {
    info!(count = tags.len(), "Tag deltas");
    for tag in &tags {
      trace!(owner = %tag.owner, entry = %tag.entry, count = tag.count, "Tag delta");
    }
    Ok(())
  }
}

/// Non-blocking producer side of the notifier lane
#[derive(Debug, Clone)]
pub struct NotificationEmitter {
  tx: mpsc::Sender<Vec<Tag>>,
}

impl NotificationEmitter {
  pub fn new(tx: mpsc::Sender<Vec<Tag>>) -> Self {
    Self { tx }
  }

  /// Queue a batch for delivery. A full or closed lane drops the batch.
  pub fn emit(&self, tags: Vec<Tag>) {
    if tags.is_empty() {
      return;
    }
    match self.tx.try_send(tags) {
      Ok(()) => {}
      Err(TrySendError::Full(dropped)) => {
        warn!(count = dropped.len(), "Notifier lane full, dropping tag deltas");
      }
      Err(TrySendError::Closed(dropped)) => {
        warn!(count = dropped.len(), "Notifier lane closed, dropping tag deltas");
      }
    }
  }
}
