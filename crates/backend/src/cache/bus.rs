//! Invalidation channel shared by every process that caches counters.
//!
//! Writers never push new values across processes. They publish the key they
//! touched and every subscriber, the writer included, evicts it.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::CounterKey;
use crate::domain::config::CacheConfig;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
  #[error("No subscriber is listening for invalidations")]
  NoSubscribers,
}

/// Publish/subscribe transport for counter invalidations
#[async_trait]
pub trait InvalidationBus: Send + Sync {
  async fn publish(&self, key: CounterKey) -> Result<(), CacheError>;

  fn subscribe(&self) -> broadcast::Receiver<CounterKey>;
}

/// Bus backed by a `tokio::sync::broadcast` channel.
///
/// Every [`CounterCache`](super::CounterCache) sharing one `BroadcastBus`
/// behaves like a separate server process on the same channel.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
  tx: broadcast::Sender<CounterKey>,
}

impl BroadcastBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  /// Bus buffering `invalidation_buffer` events per subscriber
  pub fn from_config(config: &CacheConfig) -> Self {
    Self::new(config.invalidation_buffer)
  }
}

#[async_trait]
impl InvalidationBus for BroadcastBus {
  async fn publish(&self, key: CounterKey) -> Result<(), CacheError> {
    self.tx.send(key).map(|_| ()).map_err(|_| CacheError::NoSubscribers)
  }

  fn subscribe(&self) -> broadcast::Receiver<CounterKey> {
    self.tx.subscribe()
  }
}
