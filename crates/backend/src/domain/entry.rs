//! Entries of the document tree and the identities around them.
//!
//! Natively stored entries use integer ids; entries that live in a
//! third-party storage mounted into the tree use opaque string ids. Both are
//! folded into a single [`EntryId`] so that ancestor walks and tag lookups
//! never need to be duplicated per id type.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identities
// ============================================================================

/// A user of the tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
  /// Generate a fresh random user id
  pub fn random() -> Self {
    Self(Uuid::new_v4())
  }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<Uuid> for UserId {
  fn from(id: Uuid) -> Self {
    Self(id)
  }
}

/// A tenant (portal). Well-known roots and cache keys are scoped by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub u32);

impl fmt::Display for TenantId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Identifier of a file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryId {
  /// Entry stored in the native database
  Native(u64),
  /// Entry backed by a third-party provider mounted into the tree
  Mounted(String),
}

impl EntryId {
  pub fn is_mounted(&self) -> bool {
    matches!(self, Self::Mounted(_))
  }
}

impl fmt::Display for EntryId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Native(id) => write!(f, "{}", id),
      Self::Mounted(id) => write!(f, "{}", id),
    }
  }
}

impl From<u64> for EntryId {
  fn from(id: u64) -> Self {
    Self::Native(id)
  }
}

impl From<&str> for EntryId {
  fn from(id: &str) -> Self {
    Self::Mounted(id.to_string())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryType {
  File,
  Folder,
}

/// Fully qualified reference to an entry.
///
/// File and folder ids come from different sequences, so a bare [`EntryId`]
/// is ambiguous; tags always point at an `EntryKey`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
  pub id: EntryId,
  pub entry_type: EntryType,
}

impl EntryKey {
  pub fn folder(id: impl Into<EntryId>) -> Self {
    Self {
      id: id.into(),
      entry_type: EntryType::Folder,
    }
  }

  pub fn file(id: impl Into<EntryId>) -> Self {
    Self {
      id: id.into(),
      entry_type: EntryType::File,
    }
  }

  pub fn is_folder(&self) -> bool {
    self.entry_type == EntryType::Folder
  }
}

impl fmt::Display for EntryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.entry_type {
      EntryType::File => write!(f, "file:{}", self.id),
      EntryType::Folder => write!(f, "folder:{}", self.id),
    }
  }
}

// ============================================================================
// Root Scopes
// ============================================================================

/// The well-known top-level tree an entry belongs to.
///
/// Root scopes bound ancestor propagation: each one decides which synthetic
/// root folder aggregates the counts of a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RootScope {
  UserHome,
  Common,
  SharedWithMe,
  VirtualRooms,
  Privacy,
  LegacyProjects,
  Recent,
  Favorites,
  Templates,
  Trash,
}

impl RootScope {
  /// Scopes whose root folder is distinct for every user
  pub fn is_per_user(self) -> bool {
    matches!(
      self,
      Self::UserHome | Self::Privacy | Self::Recent | Self::Favorites | Self::Templates | Self::Trash
    )
  }

  /// Scopes that appear as badge roots in the UI
  pub const BADGE_ROOTS: [RootScope; 6] = [
    Self::UserHome,
    Self::Common,
    Self::SharedWithMe,
    Self::VirtualRooms,
    Self::Privacy,
    Self::LegacyProjects,
  ];
}

impl fmt::Display for RootScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::UserHome => "user_home",
      Self::Common => "common",
      Self::SharedWithMe => "shared_with_me",
      Self::VirtualRooms => "virtual_rooms",
      Self::Privacy => "privacy",
      Self::LegacyProjects => "legacy_projects",
      Self::Recent => "recent",
      Self::Favorites => "favorites",
      Self::Templates => "templates",
      Self::Trash => "trash",
    };
    f.write_str(name)
  }
}

// ============================================================================
// Entry
// ============================================================================

/// A node of the document forest.
///
/// Background jobs capture an owned clone of the entry so later mutation of
/// the live object cannot race the fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
  pub id: EntryId,
  pub entry_type: EntryType,
  /// Containing folder, `None` only for tree roots
  pub parent_id: Option<EntryId>,
  /// Root folder of the tree this entry lives in
  pub root_id: EntryId,
  pub root_scope: RootScope,
  /// Creator of the tree root (the home owner for UserHome trees)
  pub root_owner: UserId,
  pub owner: UserId,
  /// Backed by a third-party provider
  pub provider_mounted: bool,
  /// Folder designated as a room
  pub is_room: bool,
}

impl Entry {
  pub fn key(&self) -> EntryKey {
    EntryKey {
      id: self.id.clone(),
      entry_type: self.entry_type,
    }
  }

  pub fn is_folder(&self) -> bool {
    self.entry_type == EntryType::Folder
  }

  /// Folder the ancestor walk starts from: the entry itself for folders,
  /// the containing folder for files.
  pub fn walk_start(&self) -> Option<&EntryId> {
    match self.entry_type {
      EntryType::Folder => Some(&self.id),
      EntryType::File => self.parent_id.as_ref(),
    }
  }
}
