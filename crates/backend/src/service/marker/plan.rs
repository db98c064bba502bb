//! Tag writes computed by one operation, committed together.

use tracing::trace;

use crate::{
  domain::{entry::UserId, tag::Tag},
  store::{Result, TagStore},
};

/// Pending tag writes. Built while reading, written only once complete.
#[derive(Debug, Default)]
pub(crate) struct TagPlan {
  pub create: Vec<Tag>,
  /// Existing tags to bump by one, with their pre-increment count
  pub increment: Vec<Tag>,
  pub update: Vec<Tag>,
  pub remove: Vec<Tag>,
}

/// Tags as they stand after a commit
#[derive(Debug, Default)]
pub(crate) struct TagChanges {
  pub written: Vec<Tag>,
  pub removed: Vec<Tag>,
}

impl TagChanges {
  pub fn is_empty(&self) -> bool {
    self.written.is_empty() && self.removed.is_empty()
  }
}

impl TagPlan {
  pub fn is_empty(&self) -> bool {
    self.create.is_empty() && self.increment.is_empty() && self.update.is_empty() && self.remove.is_empty()
  }

  pub fn extend(&mut self, other: TagPlan) {
    self.create.extend(other.create);
    self.increment.extend(other.increment);
    self.update.extend(other.update);
    self.remove.extend(other.remove);
  }

  /// Shift an existing tag by `delta`, removing it once it reaches zero
  pub fn adjust(&mut self, mut tag: Tag, delta: i64) {
    tag.count += delta;
    if tag.count <= 0 {
      trace!(owner = %tag.owner, entry = %tag.entry, "Counter reached zero");
      self.remove.push(tag);
    } else {
      self.update.push(tag);
    }
  }

  pub async fn commit(self, tags: &dyn TagStore, acting: UserId) -> Result<TagChanges> {
    let mut written = Vec::new();

    if !self.create.is_empty() {
      written.extend(tags.save_tags(&self.create).await?);
    }
    if !self.increment.is_empty() {
      tags.increment_tags(&self.increment, acting).await?;
      written.extend(self.increment.into_iter().map(|mut t| {
        t.count += 1;
        t
      }));
    }
    if !self.update.is_empty() {
      tags.update_tags(&self.update).await?;
      written.extend(self.update);
    }
    if !self.remove.is_empty() {
      tags.remove_tags(&self.remove).await?;
    }

    Ok(TagChanges {
      written,
      removed: self.remove,
    })
  }
}
