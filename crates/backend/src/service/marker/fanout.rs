//! Fan-out of a newly visible entry to every reader and their ancestors.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, trace};

use super::{FileMarker, plan::TagPlan};
use crate::{
  domain::{
    entry::{Entry, EntryId, EntryKey, RootScope, TenantId, UserId},
    tag::{Tag, TagKind},
  },
  service::util::MarkerError,
};

/// Snapshot captured when a fan-out is queued.
///
/// The entry is an owned clone, so later changes to the live entry cannot
/// race the job.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkTask {
  pub tenant: TenantId,
  pub acting: UserId,
  pub entry: Entry,
  /// Explicit recipients; everyone who can read the entry, minus the acting user, when `None`
  pub recipients: Option<Vec<UserId>>,
}

impl FileMarker {
  /// Mark `task.entry` new for its recipients and bump every counter above it.
  ///
  /// Recipients already holding a mark on the entry are skipped, so running
  /// the same task twice leaves the tags as one run does.
  pub async fn exec_mark_as_new(&self, task: MarkTask) -> Result<(), MarkerError> {
    let MarkTask {
      tenant,
      acting,
      entry,
      recipients,
    } = task;

    if entry.root_scope == RootScope::Trash {
      trace!(entry = %entry.key(), "Skipping trashed entry");
      return Ok(());
    }

    let mut recipients = match recipients {
      Some(users) => users,
      None => {
        let mut users = self.visibility.who_can_read(&entry).await?;
        users.retain(|u| *u != acting);
        users
      }
    };

    let walk = self.walk(&entry).await?;

    // The room owner always hears about content added to their room
    let room_owner = walk
      .room_owner
      .filter(|owner| entry.root_scope == RootScope::VirtualRooms && *owner != acting);
    if let Some(owner) = room_owner {
      recipients.push(owner);
    }

    let mut seen = HashSet::new();
    recipients.retain(|u| seen.insert(*u));
    if recipients.is_empty() {
      debug!(entry = %entry.key(), "No recipients to mark");
      return Ok(());
    }

    let readers = self.readers(&walk.parents).await?;
    let mut fanout: Vec<(UserId, Vec<EntryId>)> = Vec::with_capacity(recipients.len());
    for user in recipients {
      let targets = self.counting_folders(tenant, &entry, &walk, &readers, user).await?;
      fanout.push((user, targets));
    }

    let entry_key = entry.key();
    let changes = {
      let _guard = self.lock.lock().await;

      let keys: Vec<EntryKey> = fanout
        .iter()
        .flat_map(|(_, targets)| targets.iter().cloned().map(EntryKey::folder))
        .chain(std::iter::once(entry_key.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
      let existing: HashMap<(UserId, EntryKey), Tag> = self
        .tags
        .get_tags(None, TagKind::New, &keys)
        .await?
        .into_iter()
        .map(|t| ((t.owner, t.entry.clone()), t))
        .collect();

      let mut plan = TagPlan::default();
      for (user, targets) in &fanout {
        if existing.contains_key(&(*user, entry_key.clone())) {
          trace!(user = %user, entry = %entry_key, "Already marked");
          continue;
        }

        plan.create.push(Tag::new_mark(*user, entry_key.clone(), 1).with_counted_in(targets.clone()));
        for (i, folder) in targets.iter().enumerate() {
          let key = EntryKey::folder(folder.clone());
          match existing.get(&(*user, key.clone())) {
            Some(tag) => plan.increment.push(tag.clone()),
            None => plan.create.push(Tag::new_mark(*user, key, 1).with_counted_in(targets[i + 1..].to_vec())),
          }
        }
      }

      if plan.is_empty() {
        return Ok(());
      }
      plan.commit(self.tags.as_ref(), acting).await?
    };

    debug!(
      entry = %entry_key,
      recipients = fanout.len(),
      written = changes.written.len(),
      "Marked as new"
    );
    self.publish(tenant, changes).await;
    Ok(())
  }
}
