//! Process-local cache of unseen counters.
//!
//! Key: (tenant, user, folder)
//! Value: the folder's stored `New` count for that user
//!
//! The cache is purely derived. Writers evict and publish; every process
//! subscribed to the same [`InvalidationBus`] evicts on receipt. Values are
//! only ever inserted by the reading process after a store lookup.

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use moka::future::Cache;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::bus::InvalidationBus;
use crate::domain::{
  config::CacheConfig,
  entry::{EntryId, TenantId, UserId},
};

/// Structured cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
  pub tenant: TenantId,
  pub user: UserId,
  pub folder: EntryId,
}

impl CounterKey {
  pub fn new(tenant: TenantId, user: UserId, folder: EntryId) -> Self {
    Self { tenant, user, folder }
  }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
  pub entry_count: u64,
  pub evictions_received: u64,
}

pub struct CounterCache {
  cache: Cache<CounterKey, i64>,
  bus: Arc<dyn InvalidationBus>,
  /// Bumped on every eviction so a slow reader cannot re-insert a value it
  /// computed before an invalidation arrived
  generation: AtomicU64,
  evictions_received: AtomicU64,
}

impl CounterCache {
  pub fn new(config: &CacheConfig, bus: Arc<dyn InvalidationBus>) -> Self {
    Self {
      cache: Cache::builder()
        .max_capacity(config.max_capacity)
        .time_to_live(config.ttl())
        .build(),
      bus,
      generation: AtomicU64::new(0),
      evictions_received: AtomicU64::new(0),
    }
  }

  pub async fn get(&self, key: &CounterKey) -> Option<i64> {
    self.cache.get(key).await
  }

  /// Generation to hand back to [`insert_if_current`](Self::insert_if_current)
  pub fn generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }

  /// Store a recomputed count unless an eviction happened since `generation`.
  ///
  /// An eviction landing between the check and the insert is caught by the
  /// second check, which takes the value back out.
  pub async fn insert_if_current(&self, key: CounterKey, count: i64, generation: u64) -> bool {
    if self.generation() != generation {
      trace!(user = %key.user, folder = %key.folder, "Skipping cache fill after concurrent invalidation");
      return false;
    }
    self.cache.insert(key.clone(), count).await;
    if self.generation() != generation {
      trace!(user = %key.user, folder = %key.folder, "Invalidated during cache fill, dropping value");
      self.cache.invalidate(&key).await;
      return false;
    }
    true
  }

  /// Evict locally and tell every other process to do the same.
  ///
  /// A failed publish is not an error for the caller: the entry was already
  /// evicted here and other processes fall back on the TTL.
  pub async fn invalidate_and_broadcast(&self, key: CounterKey) {
    self.evict(&key).await;
    if let Err(e) = self.bus.publish(key.clone()).await {
      warn!(user = %key.user, folder = %key.folder, error = %e, "Counter invalidation not broadcast");
    }
  }

  async fn evict(&self, key: &CounterKey) {
    self.generation.fetch_add(1, Ordering::SeqCst);
    self.cache.invalidate(key).await;
  }

  /// Subscribe to the bus and evict every key announced on it until cancelled.
  ///
  /// The subscription is taken before this returns, so no invalidation
  /// published afterwards can be missed.
  pub fn spawn_listener(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
    let mut rx = self.bus.subscribe();
    let this = Arc::clone(self);

    tokio::spawn(async move {
      debug!("Counter invalidation listener started");
      loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            received = rx.recv() => match received {
                Ok(key) => {
                    this.evictions_received.fetch_add(1, Ordering::SeqCst);
                    this.evict(&key).await;
                }
                Err(RecvError::Lagged(missed)) => {
                    // Unknown keys were lost, so nothing cached can be trusted
                    warn!(missed, "Invalidation listener lagged, clearing counter cache");
                    this.generation.fetch_add(1, Ordering::SeqCst);
                    this.cache.invalidate_all();
                }
                Err(RecvError::Closed) => break,
            }
        }
      }
      debug!("Counter invalidation listener stopped");
    })
  }

  pub fn stats(&self) -> CacheStats {
    CacheStats {
      entry_count: self.cache.entry_count(),
      evictions_received: self.evictions_received.load(Ordering::SeqCst),
    }
  }
}
