//! Tags attached to entries on behalf of a user.
//!
//! Only [`TagKind::New`] is owned by the marker. The other kinds share the
//! same store and are produced by unrelated subsystems.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{EntryId, EntryKey, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagKind {
  New,
  Recent,
  Favorite,
  Locked,
  Template,
}

/// A persisted marker on an entry for one user.
///
/// For `New` tags on folders, `count` is the number of unseen entries beneath
/// the folder. A freshly created folder counts itself until it is listed.
/// File tags are presence markers and always carry `count = 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
  /// Store-assigned id, `None` until saved
  pub id: Option<u64>,
  pub owner: UserId,
  pub entry: EntryKey,
  pub kind: TagKind,
  pub count: i64,
  /// Folders whose counters this mark was added to when it was created.
  /// `None` for marks written outside the fan-out.
  #[serde(default)]
  pub counted_in: Option<Vec<EntryId>>,
  pub created_at: DateTime<Utc>,
}

impl Tag {
  /// Build an unsaved `New` tag
  pub fn new_mark(owner: UserId, entry: EntryKey, count: i64) -> Self {
    Self {
      id: None,
      owner,
      entry,
      kind: TagKind::New,
      count,
      counted_in: None,
      created_at: Utc::now(),
    }
  }

  /// Record the folders this mark is counted in
  pub fn with_counted_in(mut self, folders: Vec<EntryId>) -> Self {
    self.counted_in = Some(folders);
    self
  }

  pub fn is_folder(&self) -> bool {
    self.entry.is_folder()
  }

  /// Copy of this tag as it is announced after removal
  pub fn as_removed(&self) -> Self {
    Self { count: 0, ..self.clone() }
  }
}
