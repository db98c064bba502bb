//! Shared test helpers for marker scenario tests.

use std::{
  sync::{Arc, Mutex},
  time::Duration,
};

use async_trait::async_trait;

use crate::{
  cache::BroadcastBus,
  domain::{
    config::Config,
    entry::{Entry, EntryId, EntryKey, EntryType, RootScope, TenantId, UserId},
    tag::Tag,
  },
  engine::MarkerEngine,
  notify::{NotificationSink, NotifyError},
  service::marker::MarkerDeps,
  store::memory::MemoryStore,
};

pub const TENANT: TenantId = TenantId(1);

/// Sink that keeps every pushed batch
#[derive(Default)]
pub struct RecordingSink {
  batches: Mutex<Vec<Vec<Tag>>>,
}

impl RecordingSink {
  /// All pushed tags, in push order
  pub fn tags(&self) -> Vec<Tag> {
    self.batches.lock().unwrap().iter().flatten().cloned().collect()
  }

  /// Last pushed state of `user`'s tag on `key`
  pub fn last(&self, user: UserId, key: &EntryKey) -> Option<Tag> {
    self.tags().into_iter().rev().find(|t| t.owner == user && &t.entry == key)
  }
}

#[async_trait]
impl NotificationSink for RecordingSink {
  async fn push_tag_deltas(&self, tags: Vec<Tag>) -> Result<(), NotifyError> {
    self.batches.lock().unwrap().push(tags);
    Ok(())
  }
}

/// One "server process" over a shared in-memory store and invalidation bus.
pub struct TestContext {
  pub store: Arc<MemoryStore>,
  pub bus: Arc<BroadcastBus>,
  pub sink: Arc<RecordingSink>,
  pub engine: MarkerEngine,
  /// Creator of the tenant-wide roots
  pub admin: UserId,
}

impl TestContext {
  pub async fn new() -> Self {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(BroadcastBus::from_config(&Config::default().cache));
    let sink = Arc::new(RecordingSink::default());
    let engine = start_engine(&store, &bus, &sink);

    Self {
      store,
      bus,
      sink,
      engine,
      admin: UserId::random(),
    }
  }

  /// Another process sharing this context's store and bus
  pub fn second_process(&self) -> MarkerEngine {
    start_engine(&self.store, &self.bus, &Arc::new(RecordingSink::default()))
  }

  // ========================================================================
  // Tree building
  // ========================================================================

  /// Register a well-known root for `scope`. `user` selects per-user roots.
  pub fn root(&self, id: u64, scope: RootScope, owner: UserId, user: Option<UserId>) -> Entry {
    let entry = self.tree_root(id, scope, owner);
    self.store.set_root(TENANT, scope, user, entry.id.clone());
    entry
  }

  /// A tree root that is not one of the well-known roots
  pub fn tree_root(&self, id: u64, scope: RootScope, owner: UserId) -> Entry {
    let entry = Entry {
      id: EntryId::Native(id),
      entry_type: EntryType::Folder,
      parent_id: None,
      root_id: EntryId::Native(id),
      root_scope: scope,
      root_owner: owner,
      owner,
      provider_mounted: false,
      is_room: false,
    };
    self.store.insert(entry.clone());
    entry
  }

  /// Tenant-wide common root, readable by `readers`
  pub fn common_root(&self, readers: &[UserId]) -> Entry {
    let root = self.root(1, RootScope::Common, self.admin, None);
    for reader in readers {
      self.store.grant(&root.key(), *reader);
    }
    root
  }

  pub fn home(&self, id: u64, user: UserId) -> Entry {
    self.root(id, RootScope::UserHome, user, Some(user))
  }

  pub fn shared_root(&self, id: u64) -> Entry {
    self.root(id, RootScope::SharedWithMe, self.admin, None)
  }

  pub fn folder(&self, id: impl Into<EntryId>, parent: &Entry, owner: UserId) -> Entry {
    self.child(id.into(), EntryType::Folder, parent, owner)
  }

  pub fn file(&self, id: impl Into<EntryId>, parent: &Entry, owner: UserId) -> Entry {
    self.child(id.into(), EntryType::File, parent, owner)
  }

  /// Room folder; string ids make it provider-mounted
  pub fn room(&self, id: impl Into<EntryId>, parent: &Entry, owner: UserId) -> Entry {
    let mut room = self.folder(id, parent, owner);
    room.is_room = true;
    self.store.insert(room.clone());
    room
  }

  fn child(&self, id: EntryId, entry_type: EntryType, parent: &Entry, owner: UserId) -> Entry {
    let entry = Entry {
      provider_mounted: id.is_mounted(),
      id,
      entry_type,
      parent_id: Some(parent.id.clone()),
      root_id: parent.root_id.clone(),
      root_scope: parent.root_scope,
      root_owner: parent.root_owner,
      owner,
      is_room: false,
    };
    self.store.insert(entry.clone());
    entry
  }

  // ========================================================================
  // Operations
  // ========================================================================

  /// Mark as new for everyone who can read it and wait for the lane
  pub async fn mark(&self, acting: UserId, entry: &Entry) {
    self.engine.mark_as_new(TENANT, acting, entry, None).await.unwrap();
    self.engine.flush().await.unwrap();
  }

  /// Mark seen for `user` and wait for the lane
  pub async fn see(&self, user: UserId, entry: &Entry) {
    self.engine.remove_mark_as_new(TENANT, user, entry, None).await.unwrap();
    self.engine.flush().await.unwrap();
  }

  /// List `children` of `parent` as `user`
  pub async fn list(&self, user: UserId, parent: &Entry, children: &[&Entry]) -> crate::service::marker::Listing {
    let children = children.iter().map(|e| (*e).clone()).collect();
    self.engine.set_tags_new(TENANT, user, parent, children).await.unwrap()
  }

  pub fn count(&self, user: UserId, entry: &Entry) -> i64 {
    self.store.count(user, &entry.key())
  }

  /// Counts of `user` on `entries`, in order
  pub fn counts(&self, user: UserId, entries: &[&Entry]) -> Vec<i64> {
    entries.iter().map(|e| self.count(user, e)).collect()
  }

  /// Assert `Count(folder) == sum of Count(child)` for `user`
  pub fn assert_sum(&self, user: UserId, folder: &Entry, children: &[&Entry]) {
    let sum: i64 = children.iter().map(|c| self.count(user, c)).sum();
    assert_eq!(self.count(user, folder), sum, "sum invariant broken at {}", folder.key());
  }

  /// Let the notifier lane catch up
  pub async fn settle(&self) {
    tokio::time::sleep(Duration::from_millis(20)).await;
  }
}

fn start_engine(store: &Arc<MemoryStore>, bus: &Arc<BroadcastBus>, sink: &Arc<RecordingSink>) -> MarkerEngine {
  MarkerEngine::start(
    &Config::default(),
    MarkerDeps::from_store(store.clone()),
    bus.clone(),
    sink.clone(),
  )
  .expect("start engine")
}
