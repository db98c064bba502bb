//! File marker service layer.
//!
//! Maintains, per user, a `New` tag on every unseen entry and an unseen
//! counter on every folder above it. All tag reads and writes happen under
//! one coarse lock, so two operations touching the same ancestors never
//! interleave their read-modify-write cycles.
//!
//! ## Available Operations
//!
//! - [`FileMarker::exec_mark_as_new`] - Fan a newly visible entry out to its readers
//! - [`FileMarker::exec_remove_mark`] - Mark an entry seen for one user
//! - [`FileMarker::exec_remove_for_all`] - Mark an entry seen for everyone holding a mark
//! - [`FileMarker::set_tags_new`] - Annotate a folder listing and repair the folder's count
//! - [`FileMarker::root_unseen_count`] - Cache-first badge count of a root folder
//! - [`FileMarker::root_summary`] - Badge counts of every well-known root
//! - [`FileMarker::marked_items`] - New tags beneath a folder
//!
//! ## Root substitution
//!
//! Propagation ends at a per-scope anchor: the recipient's own home root, the
//! "Shared with me" root for someone else's home tree, the common, privacy,
//! projects or rooms root otherwise. Content of a provider-mounted room stops
//! at the room.

mod fanout;
mod plan;
mod query;
mod reconcile;
mod remove;

use std::{
  collections::{BTreeMap, HashMap, HashSet},
  sync::Arc,
};

use tokio::sync::Mutex;
use tracing::trace;

pub use self::{
  fanout::MarkTask,
  query::RootCount,
  reconcile::{ListedEntry, Listing},
};
use self::plan::TagChanges;
use crate::{
  cache::{CounterCache, CounterKey, RootIdCache},
  domain::{
    config::CacheConfig,
    entry::{Entry, EntryId, EntryKey, RootScope, TenantId, UserId},
    tag::{Tag, TagKind},
  },
  notify::NotificationEmitter,
  service::util::MarkerError,
  store::{RootResolver, StoreError, TagStore, VisibilityResolver},
};

/// The collaborators the marker consumes
#[derive(Clone)]
pub struct MarkerDeps {
  pub tags: Arc<dyn TagStore>,
  pub visibility: Arc<dyn VisibilityResolver>,
  pub roots: Arc<dyn RootResolver>,
}

impl MarkerDeps {
  /// Use one object for all three interfaces
  pub fn from_store<S>(store: Arc<S>) -> Self
  where
    S: TagStore + VisibilityResolver + RootResolver + 'static,
  {
    Self {
      tags: store.clone(),
      visibility: store.clone(),
      roots: store,
    }
  }
}

/// Folders above an entry, leaf first
pub(crate) struct Walk {
  pub parents: Vec<Entry>,
  /// Owner of the nearest room folder, the entry itself included
  pub room_owner: Option<UserId>,
}

pub struct FileMarker {
  tags: Arc<dyn TagStore>,
  visibility: Arc<dyn VisibilityResolver>,
  roots: RootIdCache,
  counters: Arc<CounterCache>,
  notifier: NotificationEmitter,
  lock: Mutex<()>,
}

impl FileMarker {
  pub fn new(
    deps: MarkerDeps,
    cache: &CacheConfig,
    counters: Arc<CounterCache>,
    notifier: NotificationEmitter,
  ) -> Self {
    Self {
      tags: deps.tags,
      visibility: deps.visibility,
      roots: RootIdCache::new(cache, deps.roots),
      counters,
      notifier,
      lock: Mutex::new(()),
    }
  }

  pub fn counters(&self) -> &Arc<CounterCache> {
    &self.counters
  }

  pub fn roots(&self) -> &RootIdCache {
    &self.roots
  }

  /// Members of the legacy project owning `entry`
  pub async fn project_team(&self, entry: &Entry) -> Result<Vec<UserId>, MarkerError> {
    Ok(self.visibility.project_team(entry).await?)
  }

  // ========================================================================
  // Tree walking
  // ========================================================================

  /// Resolve the folders above `entry`.
  ///
  /// Content of a provider-mounted room is cut at the first room, inclusive.
  pub(crate) async fn walk(&self, entry: &Entry) -> Result<Walk, MarkerError> {
    let start = entry
      .walk_start()
      .ok_or_else(|| MarkerError::inconsistent(format!("{} has no parent", entry.key())))?;

    let mut chain = self.visibility.ancestors(start).await.map_err(|e| match e {
      StoreError::NotFound(_) => MarkerError::not_found("folder", start.to_string()),
      other => other.into(),
    })?;

    let room = chain.iter().position(|f| f.is_room);
    let room_owner = room.map(|i| chain[i].owner);
    if entry.root_scope == RootScope::VirtualRooms
      && entry.provider_mounted
      && let Some(i) = room
    {
      chain.truncate(i + 1);
    }

    if entry.is_folder() && chain.first().is_some_and(|f| f.id == entry.id) {
      chain.remove(0);
    }

    Ok(Walk {
      parents: chain,
      room_owner,
    })
  }

  /// Root folder that aggregates `user`'s counts for `entry`'s tree
  pub(crate) async fn anchor(&self, tenant: TenantId, entry: &Entry, user: UserId) -> Result<Option<EntryId>, MarkerError> {
    let scope = match entry.root_scope {
      RootScope::UserHome if entry.root_owner == user => RootScope::UserHome,
      RootScope::UserHome => RootScope::SharedWithMe,
      RootScope::VirtualRooms if entry.provider_mounted => return Ok(None),
      scope @ (RootScope::Common | RootScope::VirtualRooms | RootScope::Privacy | RootScope::LegacyProjects) => scope,
      _ => return Ok(None),
    };
    Ok(self.roots.root(tenant, scope, user).await?)
  }

  /// Folders whose tags move with `entry` for `user`, without a readability check
  pub(crate) async fn targets(
    &self,
    tenant: TenantId,
    entry: &Entry,
    parents: &[Entry],
    user: UserId,
  ) -> Result<Vec<EntryId>, MarkerError> {
    let mut targets: Vec<EntryId> = parents
      .iter()
      .filter(|f| !is_foreign_home_root(entry, f, user))
      .map(|f| f.id.clone())
      .collect();
    if let Some(anchor) = self.anchor(tenant, entry, user).await? {
      targets.push(anchor);
    }
    Ok(finish_targets(entry, targets))
  }

  /// Readers of every folder in `parents`
  pub(crate) async fn readers(&self, parents: &[Entry]) -> Result<HashMap<EntryId, Vec<UserId>>, MarkerError> {
    let mut readers = HashMap::with_capacity(parents.len());
    for folder in parents {
      readers.insert(folder.id.clone(), self.visibility.who_can_read(folder).await?);
    }
    Ok(readers)
  }

  /// Folders that count `entry` for `user`, leaf first, anchor last.
  ///
  /// Only ancestors `user` can read qualify, except for the owner of the
  /// room the entry sits in, who gets the whole chain.
  pub(crate) async fn counting_folders(
    &self,
    tenant: TenantId,
    entry: &Entry,
    walk: &Walk,
    readers: &HashMap<EntryId, Vec<UserId>>,
    user: UserId,
  ) -> Result<Vec<EntryId>, MarkerError> {
    let whole_chain = entry.root_scope == RootScope::VirtualRooms && walk.room_owner == Some(user);
    let mut targets: Vec<EntryId> = walk
      .parents
      .iter()
      .filter(|f| !is_foreign_home_root(entry, f, user))
      .filter(|f| whole_chain || readers.get(&f.id).is_some_and(|r| r.contains(&user)))
      .map(|f| f.id.clone())
      .collect();
    if let Some(anchor) = self.anchor(tenant, entry, user).await? {
      targets.push(anchor);
    }
    Ok(finish_targets(entry, targets))
  }

  /// Which of `user`'s special roots `folder` is: their home root, the
  /// common root or their "Shared with me" root
  async fn special_root(&self, tenant: TenantId, folder: &Entry, user: UserId) -> Result<Option<RootScope>, MarkerError> {
    for scope in [RootScope::UserHome, RootScope::Common, RootScope::SharedWithMe] {
      if self.roots.root(tenant, scope, user).await?.as_ref() == Some(&folder.id) {
        return Ok(Some(scope));
      }
    }
    Ok(None)
  }

  /// Marks of `user` beneath `folder`, the folder's own mark left out.
  ///
  /// Mounted subtrees are expanded when `expand` is set or when `folder` is
  /// one of the user's special roots. The "Shared with me" root has no
  /// stored children, so its marks are the user's marks in other people's
  /// home trees.
  async fn marks_beneath(
    &self,
    tenant: TenantId,
    folder: &Entry,
    user: UserId,
    expand: bool,
  ) -> Result<Vec<Tag>, MarkerError> {
    let key = folder.key();
    let special = self.special_root(tenant, folder, user).await?;
    if special == Some(RootScope::SharedWithMe) {
      return self.shared_marks(user, &key).await;
    }

    let within = self.tags.get_tags_within(user, TagKind::New, &folder.id, true).await?;
    if expand || special.is_some() {
      return self.expand_mounts(user, within, &key).await;
    }
    Ok(within.into_iter().filter(|t| t.entry != key).collect())
  }

  /// Marks of `user` anchored at their "Shared with me" root
  async fn shared_marks(&self, user: UserId, skip: &EntryKey) -> Result<Vec<Tag>, MarkerError> {
    let marks = self.tags.get_owner_tags(user, TagKind::New).await?;
    let keys: Vec<EntryKey> = marks.iter().map(|t| t.entry.clone()).collect();
    let shared: HashSet<EntryKey> = self
      .visibility
      .entries(&keys)
      .await?
      .into_iter()
      .filter(|e| e.root_scope == RootScope::UserHome && e.root_owner != user)
      .map(|e| e.key())
      .collect();
    trace!(user = %user, marks = shared.len(), "Collected shared marks");
    Ok(
      marks
        .into_iter()
        .filter(|t| &t.entry != skip && shared.contains(&t.entry))
        .collect(),
    )
  }

  /// `tags` plus everything beneath the provider mount roots among them,
  /// keyed and ordered by entry, `skip` left out
  async fn expand_mounts(&self, user: UserId, tags: Vec<Tag>, skip: &EntryKey) -> Result<Vec<Tag>, MarkerError> {
    let mut found: BTreeMap<EntryKey, Tag> = BTreeMap::new();
    let mut pending: Vec<EntryId> = Vec::new();
    let mut expanded: HashSet<EntryId> = HashSet::new();

    let mut absorb = |tags: Vec<Tag>, pending: &mut Vec<EntryId>| {
      for tag in tags {
        if &tag.entry == skip {
          continue;
        }
        if tag.is_folder() && tag.entry.id.is_mounted() {
          pending.push(tag.entry.id.clone());
        }
        found.entry(tag.entry.clone()).or_insert(tag);
      }
    };

    absorb(tags, &mut pending);
    expanded.insert(skip.id.clone());
    while let Some(mount) = pending.pop() {
      if !expanded.insert(mount.clone()) {
        continue;
      }
      trace!(user = %user, folder = %mount, "Expanding mounted subtree");
      let inner = self.tags.get_tags_within(user, TagKind::New, &mount, true).await?;
      absorb(inner, &mut pending);
    }

    Ok(found.into_values().collect())
  }

  // ========================================================================
  // Publishing
  // ========================================================================

  /// Invalidate every touched folder counter, then hand the deltas to the notifier
  async fn publish(&self, tenant: TenantId, changes: TagChanges) {
    if changes.is_empty() {
      return;
    }

    let keys: HashSet<CounterKey> = changes
      .written
      .iter()
      .chain(&changes.removed)
      .filter(|t| t.is_folder())
      .map(|t| CounterKey::new(tenant, t.owner, t.entry.id.clone()))
      .collect();
    for key in keys {
      self.counters.invalidate_and_broadcast(key).await;
    }

    let mut deltas = changes.written;
    deltas.extend(changes.removed.iter().map(Tag::as_removed));
    self.notifier.emit(deltas);
  }
}

/// Someone else's home root, replaced by "Shared with me" for `user`
fn is_foreign_home_root(entry: &Entry, folder: &Entry, user: UserId) -> bool {
  entry.root_scope == RootScope::UserHome && entry.root_owner != user && folder.id == entry.root_id
}

/// Deduplicate in order and drop the entry itself
fn finish_targets(entry: &Entry, targets: Vec<EntryId>) -> Vec<EntryId> {
  let mut seen = HashSet::new();
  targets
    .into_iter()
    .filter(|id| !(entry.is_folder() && *id == entry.id))
    .filter(|id| seen.insert(id.clone()))
    .collect()
}
