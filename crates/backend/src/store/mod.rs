//! Interfaces to the collaborators the marker consumes.
//!
//! The tag store, the visibility resolver and the root resolver are owned by
//! the surrounding document service. The marker only talks to them through
//! these traits; [`memory::MemoryStore`] implements all three in process.

pub mod memory;

use async_trait::async_trait;

use crate::domain::{
  entry::{Entry, EntryId, EntryKey, RootScope, TenantId, UserId},
  tag::{Tag, TagKind},
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
  #[error("Store unavailable: {0}")]
  Unavailable(String),
  #[error("Not found: {0}")]
  NotFound(String),
  #[error("Store query error: {0}")]
  Query(String),
}

impl StoreError {
  /// Timeouts and connection loss, as opposed to bad input
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Unavailable(_))
  }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable storage of `(owner, entry, kind, count)` tuples.
#[async_trait]
pub trait TagStore: Send + Sync {
  /// Tags of `kind` on any of `entries`, held by `owner` or by anyone when `owner` is `None`.
  async fn get_tags(&self, owner: Option<UserId>, kind: TagKind, entries: &[EntryKey]) -> Result<Vec<Tag>>;

  /// Tags of `owner` on `folder` and beneath it.
  ///
  /// Without `deep` only the folder and its direct children are searched.
  /// Searches never descend into a provider-mounted subtree: such a subtree
  /// contributes at most the tag on its mount root.
  async fn get_tags_within(&self, owner: UserId, kind: TagKind, folder: &EntryId, deep: bool) -> Result<Vec<Tag>>;

  /// Every tag of `kind` held by `owner`
  async fn get_owner_tags(&self, owner: UserId, kind: TagKind) -> Result<Vec<Tag>>;

  /// Insert new tags, returning them with their assigned ids
  async fn save_tags(&self, tags: &[Tag]) -> Result<Vec<Tag>>;

  /// Add one to the stored count of every given tag
  async fn increment_tags(&self, tags: &[Tag], acting: UserId) -> Result<()>;

  /// Overwrite the stored count of every given tag
  async fn update_tags(&self, tags: &[Tag]) -> Result<()>;

  async fn remove_tags(&self, tags: &[Tag]) -> Result<()>;
}

/// Answers who can see an entry and where it sits in the tree.
#[async_trait]
pub trait VisibilityResolver: Send + Sync {
  async fn who_can_read(&self, entry: &Entry) -> Result<Vec<UserId>>;

  /// `folder` followed by its ancestors up to the tree root (leaf first).
  async fn ancestors(&self, folder: &EntryId) -> Result<Vec<Entry>>;

  /// The entries behind `keys`. Unknown keys are left out.
  async fn entries(&self, keys: &[EntryKey]) -> Result<Vec<Entry>>;

  /// Members of the legacy project that owns `entry`
  async fn project_team(&self, entry: &Entry) -> Result<Vec<UserId>>;
}

/// Resolves the well-known root folders of a tenant.
#[async_trait]
pub trait RootResolver: Send + Sync {
  /// Root folder of `scope`. `user` selects the root for per-user scopes and
  /// is ignored for tenant-wide ones. `None` when the root does not exist
  /// (yet) for that user.
  async fn root_id(&self, tenant: TenantId, scope: RootScope, user: UserId) -> Result<Option<EntryId>>;
}
