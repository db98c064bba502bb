//! In-process implementation of every store interface.
//!
//! `MemoryStore` keeps the tree, the read grants, the well-known roots and
//! the tags in `DashMap`s. It backs the scenario tests and is usable by hosts
//! that keep their document tree in memory.
//!
//! Read access is inherited: a user can read an entry when they own it, own
//! the personal tree it lives in, or hold a grant on it or any ancestor.

use std::{
  collections::{BTreeSet, HashSet},
  sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use super::{Result, RootResolver, StoreError, TagStore, VisibilityResolver};
use crate::domain::{
  entry::{Entry, EntryId, EntryKey, RootScope, TenantId, UserId},
  tag::{Tag, TagKind},
};

/// Guard against corrupted parent links
const MAX_DEPTH: usize = 256;

type TagKey = (UserId, EntryKey, TagKind);
type RootKey = (TenantId, RootScope, Option<UserId>);

#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: DashMap<EntryKey, Entry>,
  grants: DashMap<EntryKey, HashSet<UserId>>,
  teams: DashMap<EntryId, Vec<UserId>>,
  roots: DashMap<RootKey, EntryId>,
  tags: DashMap<TagKey, Tag>,
  next_tag_id: AtomicU64,
  unavailable: AtomicBool,
  root_lookups: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  // ========================================================================
  // Tree and ACL
  // ========================================================================

  pub fn insert(&self, entry: Entry) {
    self.entries.insert(entry.key(), entry);
  }

  pub fn remove_entry(&self, key: &EntryKey) -> Option<Entry> {
    self.entries.remove(key).map(|(_, entry)| entry)
  }

  pub fn entry(&self, key: &EntryKey) -> Option<Entry> {
    self.entries.get(key).map(|e| e.value().clone())
  }

  /// Grant read access to an entry and everything beneath it
  pub fn grant(&self, key: &EntryKey, user: UserId) {
    self.grants.entry(key.clone()).or_default().insert(user);
  }

  /// Register a well-known root. `user` is required for per-user scopes.
  pub fn set_root(&self, tenant: TenantId, scope: RootScope, user: Option<UserId>, id: EntryId) {
    self.roots.insert((tenant, scope, user), id);
  }

  /// Register the team of the legacy project whose tree is rooted at `root`
  pub fn set_team(&self, root: EntryId, team: Vec<UserId>) {
    self.teams.insert(root, team);
  }

  // ========================================================================
  // Tag inspection
  // ========================================================================

  /// The `New` tag of `owner` on `key`, if any
  pub fn tag(&self, owner: UserId, key: &EntryKey) -> Option<Tag> {
    self
      .tags
      .get(&(owner, key.clone(), TagKind::New))
      .map(|t| t.value().clone())
  }

  /// Stored `New` count, zero when no tag exists
  pub fn count(&self, owner: UserId, key: &EntryKey) -> i64 {
    self.tag(owner, key).map(|t| t.count).unwrap_or(0)
  }

  /// Write a tag directly, bypassing the marker
  pub fn put_tag(&self, mut tag: Tag) {
    if tag.id.is_none() {
      tag.id = Some(self.next_id());
    }
    self.tags.insert((tag.owner, tag.entry.clone(), tag.kind), tag);
  }

  /// All `New` tags, ordered by owner then entry
  pub fn new_tags(&self) -> Vec<Tag> {
    let mut tags: Vec<Tag> = self
      .tags
      .iter()
      .filter(|t| t.kind == TagKind::New)
      .map(|t| t.value().clone())
      .collect();
    tags.sort_by(|a, b| (a.owner, &a.entry).cmp(&(b.owner, &b.entry)));
    tags
  }

  /// Make every store call fail with [`StoreError::Unavailable`]
  pub fn set_unavailable(&self, unavailable: bool) {
    self.unavailable.store(unavailable, Ordering::SeqCst);
  }

  /// Number of `root_id` calls served so far
  pub fn root_lookups(&self) -> usize {
    self.root_lookups.load(Ordering::SeqCst)
  }

  // ========================================================================
  // Helpers
  // ========================================================================

  fn check(&self) -> Result<()> {
    if self.unavailable.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("memory store switched off".to_string()));
    }
    Ok(())
  }

  fn next_id(&self) -> u64 {
    self.next_tag_id.fetch_add(1, Ordering::SeqCst) + 1
  }

  fn chain(&self, folder: &EntryId) -> Result<Vec<Entry>> {
    let mut chain = Vec::new();
    let mut current = Some(folder.clone());

    while let Some(id) = current {
      if chain.len() >= MAX_DEPTH {
        return Err(StoreError::Query(format!("parent chain of {} exceeds {} levels", folder, MAX_DEPTH)));
      }
      let entry = self
        .entry(&EntryKey::folder(id.clone()))
        .ok_or_else(|| StoreError::NotFound(format!("folder {}", id)))?;
      current = entry.parent_id.clone();
      chain.push(entry);
    }

    Ok(chain)
  }

  /// Whether `key` sits beneath `folder` without crossing a mount root on the way
  fn is_within(&self, key: &EntryKey, folder: &EntryId, deep: bool) -> bool {
    let Some(entry) = self.entry(key) else {
      return false;
    };

    let mut parent = entry.parent_id;
    for _ in 0..MAX_DEPTH {
      let Some(parent_id) = parent else {
        return false;
      };
      if &parent_id == folder {
        return true;
      }
      if !deep {
        return false;
      }
      let Some(node) = self.entry(&EntryKey::folder(parent_id)) else {
        return false;
      };
      if is_mount_root(&node) {
        return false;
      }
      parent = node.parent_id;
    }
    false
  }
}

fn is_mount_root(entry: &Entry) -> bool {
  entry.provider_mounted && !entry.parent_id.as_ref().is_some_and(EntryId::is_mounted)
}

// ============================================================================
// TagStore
// ============================================================================

#[async_trait]
impl TagStore for MemoryStore {
  async fn get_tags(&self, owner: Option<UserId>, kind: TagKind, entries: &[EntryKey]) -> Result<Vec<Tag>> {
    self.check()?;
    let wanted: HashSet<&EntryKey> = entries.iter().collect();
    let mut tags: Vec<Tag> = self
      .tags
      .iter()
      .filter(|t| t.kind == kind && owner.is_none_or(|o| o == t.owner) && wanted.contains(&t.entry))
      .map(|t| t.value().clone())
      .collect();
    tags.sort_by(|a, b| (a.owner, &a.entry).cmp(&(b.owner, &b.entry)));
    Ok(tags)
  }

  async fn get_tags_within(&self, owner: UserId, kind: TagKind, folder: &EntryId, deep: bool) -> Result<Vec<Tag>> {
    self.check()?;
    let candidates: Vec<Tag> = self
      .tags
      .iter()
      .filter(|t| t.owner == owner && t.kind == kind)
      .map(|t| t.value().clone())
      .collect();

    let mut tags: Vec<Tag> = candidates
      .into_iter()
      .filter(|t| (t.entry.is_folder() && &t.entry.id == folder) || self.is_within(&t.entry, folder, deep))
      .collect();
    tags.sort_by(|a, b| a.entry.cmp(&b.entry));
    Ok(tags)
  }

  async fn get_owner_tags(&self, owner: UserId, kind: TagKind) -> Result<Vec<Tag>> {
    self.check()?;
    let mut tags: Vec<Tag> = self
      .tags
      .iter()
      .filter(|t| t.owner == owner && t.kind == kind)
      .map(|t| t.value().clone())
      .collect();
    tags.sort_by(|a, b| a.entry.cmp(&b.entry));
    Ok(tags)
  }

  async fn save_tags(&self, tags: &[Tag]) -> Result<Vec<Tag>> {
    self.check()?;
    let mut saved = Vec::with_capacity(tags.len());
    for tag in tags {
      let mut tag = tag.clone();
      tag.id = Some(self.next_id());
      trace!(owner = %tag.owner, entry = %tag.entry, count = tag.count, "save tag");
      self.tags.insert((tag.owner, tag.entry.clone(), tag.kind), tag.clone());
      saved.push(tag);
    }
    Ok(saved)
  }

  async fn increment_tags(&self, tags: &[Tag], _acting: UserId) -> Result<()> {
    self.check()?;
    for tag in tags {
      if let Some(mut stored) = self.tags.get_mut(&(tag.owner, tag.entry.clone(), tag.kind)) {
        stored.count += 1;
      }
    }
    Ok(())
  }

  async fn update_tags(&self, tags: &[Tag]) -> Result<()> {
    self.check()?;
    for tag in tags {
      if let Some(mut stored) = self.tags.get_mut(&(tag.owner, tag.entry.clone(), tag.kind)) {
        stored.count = tag.count;
      }
    }
    Ok(())
  }

  async fn remove_tags(&self, tags: &[Tag]) -> Result<()> {
    self.check()?;
    for tag in tags {
      self.tags.remove(&(tag.owner, tag.entry.clone(), tag.kind));
    }
    Ok(())
  }
}

// ============================================================================
// VisibilityResolver
// ============================================================================

#[async_trait]
impl VisibilityResolver for MemoryStore {
  async fn who_can_read(&self, entry: &Entry) -> Result<Vec<UserId>> {
    self.check()?;
    let mut readers = BTreeSet::new();
    readers.insert(entry.owner);
    if matches!(entry.root_scope, RootScope::UserHome | RootScope::Privacy) {
      readers.insert(entry.root_owner);
    }

    let mut keys = vec![entry.key()];
    if let Some(parent) = &entry.parent_id {
      // A detached entry still reports its own grants
      if let Ok(chain) = self.chain(parent) {
        keys.extend(chain.iter().map(Entry::key));
      }
    }

    for key in keys {
      if let Some(granted) = self.grants.get(&key) {
        readers.extend(granted.iter().copied());
      }
    }

    Ok(readers.into_iter().collect())
  }

  async fn ancestors(&self, folder: &EntryId) -> Result<Vec<Entry>> {
    self.check()?;
    self.chain(folder)
  }

  async fn entries(&self, keys: &[EntryKey]) -> Result<Vec<Entry>> {
    self.check()?;
    Ok(keys.iter().filter_map(|key| self.entry(key)).collect())
  }

  async fn project_team(&self, entry: &Entry) -> Result<Vec<UserId>> {
    self.check()?;
    Ok(self.teams.get(&entry.root_id).map(|t| t.value().clone()).unwrap_or_default())
  }
}

// ============================================================================
// RootResolver
// ============================================================================

#[async_trait]
impl RootResolver for MemoryStore {
  async fn root_id(&self, tenant: TenantId, scope: RootScope, user: UserId) -> Result<Option<EntryId>> {
    self.check()?;
    self.root_lookups.fetch_add(1, Ordering::SeqCst);
    let key = (tenant, scope, scope.is_per_user().then_some(user));
    Ok(self.roots.get(&key).map(|id| id.value().clone()))
  }
}
