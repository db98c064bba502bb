//! Read paths: badge counts and marked items.

use tracing::debug;

use super::FileMarker;
use crate::{
  cache::CounterKey,
  domain::{
    entry::{Entry, EntryId, EntryKey, RootScope, TenantId, UserId},
    tag::{Tag, TagKind},
  },
  service::util::MarkerError,
};

/// Badge count of one well-known root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCount {
  pub scope: RootScope,
  pub root: EntryId,
  pub count: i64,
}

impl FileMarker {
  /// Unseen count of `root` for `user`, served from the counter cache when possible
  pub async fn root_unseen_count(&self, tenant: TenantId, user: UserId, root: &EntryId) -> Result<i64, MarkerError> {
    let key = CounterKey::new(tenant, user, root.clone());
    if let Some(count) = self.counters.get(&key).await {
      return Ok(count);
    }

    let generation = self.counters.generation();
    let count = self
      .tags
      .get_tags(Some(user), TagKind::New, &[EntryKey::folder(root.clone())])
      .await?
      .first()
      .map(|t| t.count.max(0))
      .unwrap_or(0);
    self.counters.insert_if_current(key, count, generation).await;
    Ok(count)
  }

  /// Badge counts of every well-known root `user` has
  pub async fn root_summary(&self, tenant: TenantId, user: UserId) -> Result<Vec<RootCount>, MarkerError> {
    let mut summary = Vec::with_capacity(RootScope::BADGE_ROOTS.len());
    for scope in RootScope::BADGE_ROOTS {
      let Some(root) = self.roots.root(tenant, scope, user).await? else {
        continue;
      };
      let count = self.root_unseen_count(tenant, user, &root).await?;
      summary.push(RootCount { scope, root, count });
    }
    Ok(summary)
  }

  /// Marks of `user` strictly beneath `folder`, mounted subtrees included.
  /// For the "Shared with me" root these are the user's marks in other
  /// people's home trees.
  ///
  /// A folder mark with nothing new beneath it is stale and gets removed.
  pub async fn marked_items(&self, tenant: TenantId, user: UserId, folder: &Entry) -> Result<Vec<Tag>, MarkerError> {
    if !folder.is_folder() {
      return Err(MarkerError::inconsistent(format!("{} is not a folder", folder.key())));
    }
    let key = folder.key();

    let (items, changes) = {
      let _guard = self.lock.lock().await;
      let marked = !self
        .tags
        .get_tags(Some(user), TagKind::New, &[key.clone()])
        .await?
        .is_empty();
      let items = self.marks_beneath(tenant, folder, user, true).await?;

      let changes = if items.is_empty() && marked {
        debug!(user = %user, folder = %key, "Removing stale folder mark");
        let plan = self.plan_removal(tenant, folder, user).await?;
        plan.commit(self.tags.as_ref(), user).await?
      } else {
        Default::default()
      };
      (items, changes)
    };

    self.publish(tenant, changes).await;
    Ok(items)
  }
}
