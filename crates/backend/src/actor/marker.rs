//! MarkerActor - the single background lane of the file marker
//!
//! Every fan-out and removal runs here, one job at a time, so a removal can
//! never read a counter before an earlier increment has landed.
//!
//! Jobs are best-effort: a failed job is logged and dropped. A missed
//! fan-out heals the next time the affected folder is listed.

use std::{ops::ControlFlow, sync::Arc};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{handle::MarkerHandle, message::MarkerJob};
use crate::{
  domain::config::LaneConfig,
  service::marker::FileMarker,
};

pub struct MarkerActor {
  lane: String,
  marker: Arc<FileMarker>,
  job_rx: mpsc::Receiver<MarkerJob>,
  cancel: CancellationToken,
}

impl MarkerActor {
  /// Spawn the lane and return a handle to it
  pub fn spawn(
    config: &LaneConfig,
    marker: Arc<FileMarker>,
    cancel: CancellationToken,
  ) -> (MarkerHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.capacity);
    let actor = Self {
      lane: config.name.clone(),
      marker,
      job_rx: rx,
      cancel,
    };
    let task = tokio::spawn(actor.run());
    (MarkerHandle::new(tx), task)
  }

  /// Run the actor's main loop
  ///
  /// The loop exits on:
  /// - CancellationToken being cancelled
  /// - Receiving a Shutdown job
  /// - All handles being dropped
  pub async fn run(mut self) {
    info!(lane = %self.lane, "MarkerActor started");

    loop {
      tokio::select! {
          // Check cancellation first (biased)
          biased;

          _ = self.cancel.cancelled() => {
              info!(lane = %self.lane, "MarkerActor shutting down (cancelled)");
              break;
          }

          job = self.job_rx.recv() => {
              let Some(job) = job else {
                  info!(lane = %self.lane, "MarkerActor shutting down (channel closed)");
                  break;
              };
              if self.handle_job(job).await.is_break() {
                  break;
              }
          }
      }
    }

    info!(lane = %self.lane, "MarkerActor stopped");
  }

  /// Run one job. Failed work is logged and dropped.
  async fn handle_job(&self, job: MarkerJob) -> ControlFlow<()> {
    let kind = job.kind();
    let entry = job.entry().map(|e| e.key().to_string()).unwrap_or_default();
    debug!(lane = %self.lane, job = kind, "Running marker job");

    let result = match job {
      MarkerJob::MarkAsNew(task) => self.marker.exec_mark_as_new(task).await,
      MarkerJob::RemoveMark { tenant, entry, user } => self.marker.exec_remove_mark(tenant, &entry, user).await,
      MarkerJob::RemoveForAll { tenant, entry } => self.marker.exec_remove_for_all(tenant, &entry).await,
      MarkerJob::Flush(done) => {
        let _ = done.send(());
        Ok(())
      }
      MarkerJob::Shutdown => {
        info!(lane = %self.lane, "MarkerActor shutting down (requested)");
        return ControlFlow::Break(());
      }
    };

    if let Err(e) = result {
      error!(
        lane = %self.lane,
        job = kind,
        entry = %entry,
        transient = e.is_transient(),
        error = %e,
        "Marker job failed, dropping"
      );
    }
    ControlFlow::Continue(())
  }
}
