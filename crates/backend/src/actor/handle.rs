//! Handle for communicating with the marker lane
//!
//! The handle is cheap to clone and can be shared across request tasks.
//! Sending waits only for queue space, never for the job itself.

use tokio::sync::{mpsc, oneshot};

use super::message::MarkerJob;
use crate::{
  domain::entry::{Entry, TenantId, UserId},
  service::marker::MarkTask,
};

// ============================================================================
// Marker Handle
// ============================================================================

/// Handle to communicate with a MarkerActor
#[derive(Clone, Debug)]
pub struct MarkerHandle {
  pub tx: mpsc::Sender<MarkerJob>,
}

impl MarkerHandle {
  /// Create a new handle from a sender
  pub fn new(tx: mpsc::Sender<MarkerJob>) -> Self {
    Self { tx }
  }

  /// Send a job to the actor
  pub async fn send(&self, job: MarkerJob) -> Result<(), SendError> {
    self.tx.send(job).await.map_err(|_| SendError::ActorGone)
  }

  /// Queue a fan-out
  pub async fn mark_as_new(&self, task: MarkTask) -> Result<(), SendError> {
    self.send(MarkerJob::MarkAsNew(task)).await
  }

  /// Queue a removal for one user
  pub async fn remove_mark(&self, tenant: TenantId, entry: Entry, user: UserId) -> Result<(), SendError> {
    self.send(MarkerJob::RemoveMark { tenant, entry, user }).await
  }

  /// Queue a removal for every holder
  pub async fn remove_for_all(&self, tenant: TenantId, entry: Entry) -> Result<(), SendError> {
    self.send(MarkerJob::RemoveForAll { tenant, entry }).await
  }

  /// Wait until every job queued before this call has run
  pub async fn flush(&self) -> Result<(), SendError> {
    let (done_tx, done_rx) = oneshot::channel();
    self.send(MarkerJob::Flush(done_tx)).await?;
    done_rx.await.map_err(|_| SendError::ActorGone)
  }

  /// Request the actor to shutdown
  pub async fn shutdown(&self) -> Result<(), SendError> {
    self.send(MarkerJob::Shutdown).await
  }
}

// ============================================================================
// Errors
// ============================================================================

/// Error when sending to an actor
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
  #[error("Actor has shut down")]
  ActorGone,
}
