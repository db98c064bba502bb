//! Job types for the marker and notifier lanes
//!
//! Jobs are executed strictly in the order they were queued. `Flush` carries
//! a oneshot that resolves once everything queued before it has run.

use tokio::sync::oneshot;

use crate::{
  domain::entry::{Entry, TenantId, UserId},
  service::marker::MarkTask,
};

// ============================================================================
// Marker Lane Jobs
// ============================================================================

/// A job for the MarkerActor
#[derive(Debug)]
pub enum MarkerJob {
  /// Fan a newly visible entry out to its recipients
  MarkAsNew(MarkTask),
  /// Mark an entry seen for one user
  RemoveMark {
    tenant: TenantId,
    entry: Entry,
    user: UserId,
  },
  /// Mark an entry seen for every user holding a mark
  RemoveForAll { tenant: TenantId, entry: Entry },
  /// Barrier: answered once all earlier jobs have run
  Flush(oneshot::Sender<()>),
  /// Stop the lane after the jobs queued before this one
  Shutdown,
}

impl MarkerJob {
  /// Short name for logs
  pub fn kind(&self) -> &'static str {
    match self {
      Self::MarkAsNew(_) => "mark_as_new",
      Self::RemoveMark { .. } => "remove_mark",
      Self::RemoveForAll { .. } => "remove_for_all",
      Self::Flush(_) => "flush",
      Self::Shutdown => "shutdown",
    }
  }

  /// Entry the job operates on, if any
  pub fn entry(&self) -> Option<&Entry> {
    match self {
      Self::MarkAsNew(task) => Some(&task.entry),
      Self::RemoveMark { entry, .. } | Self::RemoveForAll { entry, .. } => Some(entry),
      Self::Flush(_) | Self::Shutdown => None,
    }
  }
}
