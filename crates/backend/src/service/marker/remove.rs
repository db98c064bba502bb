//! Marking entries seen.
//!
//! A file removes one from every counter it was added to. A folder removes
//! its own count, so seeing a folder with 12 unseen descendants takes 12 off
//! every ancestor counting it, and drops every mark beneath it.

use tracing::{debug, trace};

use super::{FileMarker, plan::TagPlan};
use crate::{
  domain::{
    entry::{Entry, EntryKey, TenantId, UserId},
    tag::TagKind,
  },
  service::util::MarkerError,
};

impl FileMarker {
  /// Mark `entry` seen for `user`
  pub async fn exec_remove_mark(&self, tenant: TenantId, entry: &Entry, user: UserId) -> Result<(), MarkerError> {
    let changes = {
      let _guard = self.lock.lock().await;
      let plan = self.plan_removal(tenant, entry, user).await?;
      if plan.is_empty() {
        trace!(user = %user, entry = %entry.key(), "Nothing to remove");
        return Ok(());
      }
      plan.commit(self.tags.as_ref(), user).await?
    };

    debug!(user = %user, entry = %entry.key(), removed = changes.removed.len(), "Removed mark");
    self.publish(tenant, changes).await;
    Ok(())
  }

  /// Mark `entry` seen for every user holding a mark on it
  pub async fn exec_remove_for_all(&self, tenant: TenantId, entry: &Entry) -> Result<(), MarkerError> {
    let changes = {
      let _guard = self.lock.lock().await;
      let holders = self.tags.get_tags(None, TagKind::New, &[entry.key()]).await?;

      let mut plan = TagPlan::default();
      for holder in &holders {
        plan.extend(self.plan_removal(tenant, entry, holder.owner).await?);
      }
      if plan.is_empty() {
        return Ok(());
      }
      debug!(entry = %entry.key(), users = holders.len(), "Removing mark for all holders");
      plan.commit(self.tags.as_ref(), entry.owner).await?
    };

    self.publish(tenant, changes).await;
    Ok(())
  }

  /// Writes that mark `entry` seen for `user`. Empty when `user` holds no mark on it.
  pub(crate) async fn plan_removal(&self, tenant: TenantId, entry: &Entry, user: UserId) -> Result<TagPlan, MarkerError> {
    let own = self.tags.get_tags(Some(user), TagKind::New, &[entry.key()]).await?;
    let Some(own) = own.into_iter().next() else {
      return Ok(TagPlan::default());
    };

    let mut plan = TagPlan::default();
    let magnitude = if entry.is_folder() {
      plan.remove.extend(self.marks_beneath(tenant, entry, user, false).await?);
      own.count
    } else {
      1
    };
    let counted_in = own.counted_in.clone();
    plan.remove.push(own);

    if magnitude <= 0 {
      return Ok(plan);
    }

    let folders = match counted_in {
      Some(folders) => folders,
      None => {
        let walk = self.walk(entry).await?;
        let readers = self.readers(&walk.parents).await?;
        self.counting_folders(tenant, entry, &walk, &readers, user).await?
      }
    };
    let keys: Vec<EntryKey> = folders.into_iter().map(EntryKey::folder).collect();
    for tag in self.tags.get_tags(Some(user), TagKind::New, &keys).await? {
      plan.adjust(tag, -magnitude);
    }

    Ok(plan)
  }
}
