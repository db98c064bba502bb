//! Repair-on-read for folder listings.
//!
//! When a folder is listed its children's marks are attached to the listing
//! and the folder's own counter is recomputed from them. Only the difference
//! travels further up, so drift left by writes that bypassed the fan-out is
//! repaired without rescanning the subtree.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use super::{FileMarker, plan::TagPlan};
use crate::{
  domain::{
    entry::{Entry, EntryKey, TenantId, UserId},
    tag::{Tag, TagKind},
  },
  service::util::MarkerError,
};

/// A listed child with its unseen marker
#[derive(Debug, Clone, PartialEq)]
pub struct ListedEntry {
  pub entry: Entry,
  /// Unseen count for folders, `Some(1)` for unseen files, `None` when seen
  pub new_count: Option<i64>,
}

/// Children of a folder as returned to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
  /// The folder's counter after repair
  pub parent_new: Option<i64>,
  pub children: Vec<ListedEntry>,
}

impl FileMarker {
  /// Annotate `children` of `parent` for `user` and repair `parent`'s counter.
  ///
  /// The child sum covers the stored direct children and the supplied ones,
  /// which may be synthetic (children of "Shared with me") or a single page.
  /// A folder whose children are all seen is itself marked seen.
  pub async fn set_tags_new(
    &self,
    tenant: TenantId,
    user: UserId,
    parent: &Entry,
    children: Vec<Entry>,
  ) -> Result<Listing, MarkerError> {
    if !parent.is_folder() {
      return Err(MarkerError::inconsistent(format!("{} is not a folder", parent.key())));
    }
    let parent_key = parent.key();

    let (listing, changes) = {
      let _guard = self.lock.lock().await;

      let stored = self.tags.get_tags_within(user, TagKind::New, &parent.id, false).await?;
      let child_keys: Vec<EntryKey> = children.iter().map(Entry::key).collect();
      let supplied = self.tags.get_tags(Some(user), TagKind::New, &child_keys).await?;

      let mut parent_tag = None;
      let mut child_tags: BTreeMap<EntryKey, Tag> = BTreeMap::new();
      for tag in stored.into_iter().chain(supplied) {
        if tag.entry == parent_key {
          parent_tag = Some(tag);
        } else {
          child_tags.insert(tag.entry.clone(), tag);
        }
      }

      let sum: i64 = child_tags.values().map(|t| t.count.max(0)).sum();
      let current = parent_tag.as_ref().map(|t| t.count).unwrap_or(0);

      let children = children
        .into_iter()
        .map(|entry| {
          let new_count = child_tags.get(&entry.key()).map(|t| t.count);
          ListedEntry { entry, new_count }
        })
        .collect();

      let plan = if sum == current {
        TagPlan::default()
      } else if sum == 0 {
        debug!(user = %user, folder = %parent_key, stale = current, "Listed folder has no unseen children");
        self.plan_removal(tenant, parent, user).await?
      } else {
        debug!(user = %user, folder = %parent_key, from = current, to = sum, "Repairing unseen count");
        self.plan_repair(tenant, parent, user, parent_tag, sum).await?
      };

      let changes = if plan.is_empty() {
        Default::default()
      } else {
        plan.commit(self.tags.as_ref(), user).await?
      };

      let listing = Listing {
        parent_new: (sum > 0).then_some(sum),
        children,
      };
      (listing, changes)
    };

    self.publish(tenant, changes).await;
    Ok(listing)
  }

  /// Set `parent` to `sum` and shift every counter above it by the difference.
  ///
  /// A missing ancestor tag is created for a positive difference, when the
  /// user can read that folder, and skipped for a negative one.
  async fn plan_repair(
    &self,
    tenant: TenantId,
    parent: &Entry,
    user: UserId,
    parent_tag: Option<Tag>,
    sum: i64,
  ) -> Result<TagPlan, MarkerError> {
    let mut plan = TagPlan::default();
    let diff = sum - parent_tag.as_ref().map(|t| t.count).unwrap_or(0);

    let walk = self.walk(parent).await?;
    let targets = self.targets(tenant, parent, &walk.parents, user).await?;
    let keys: Vec<EntryKey> = targets.iter().cloned().map(EntryKey::folder).collect();
    let mut existing: HashMap<EntryKey, Tag> = self
      .tags
      .get_tags(Some(user), TagKind::New, &keys)
      .await?
      .into_iter()
      .map(|t| (t.entry.clone(), t))
      .collect();

    let mut counting = Vec::with_capacity(keys.len());
    for (i, key) in keys.into_iter().enumerate() {
      match existing.remove(&key) {
        Some(tag) => {
          plan.adjust(tag, diff);
          counting.push(key.id);
        }
        None if diff > 0 => {
          let readable = match walk.parents.iter().find(|f| f.id == key.id) {
            Some(folder) => self.visibility.who_can_read(folder).await?.contains(&user),
            // the scope anchor
            None => true,
          };
          if readable {
            counting.push(key.id.clone());
            plan
              .create
              .push(Tag::new_mark(user, key, diff).with_counted_in(targets[i + 1..].to_vec()));
          }
        }
        None => trace!(user = %user, folder = %key, "Ancestor mark already gone"),
      }
    }

    match parent_tag {
      Some(mut tag) => {
        tag.count = sum;
        plan.update.push(tag);
      }
      None => plan
        .create
        .push(Tag::new_mark(user, parent.key(), sum).with_counted_in(counting)),
    }

    Ok(plan)
  }
}
