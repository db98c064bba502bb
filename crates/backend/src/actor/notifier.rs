//! NotifierActor - delivers tag deltas to the push transport
//!
//! Batches arrive from a [`NotificationEmitter`](crate::notify::NotificationEmitter)
//! and are split into chunks of at most `batch_size` tags per push call.
//! Delivery failures are logged and the chunk is dropped.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
  domain::{config::NotifyConfig, tag::Tag},
  notify::{NotificationEmitter, NotificationSink},
};

pub struct NotifierActor {
  batch_size: usize,
  sink: Arc<dyn NotificationSink>,
  rx: mpsc::Receiver<Vec<Tag>>,
  cancel: CancellationToken,
}

impl NotifierActor {
  /// Spawn the notifier and return the emitter feeding it
  pub fn spawn(
    config: &NotifyConfig,
    sink: Arc<dyn NotificationSink>,
    cancel: CancellationToken,
  ) -> (NotificationEmitter, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.buffer);
    let actor = Self {
      batch_size: config.batch_size.max(1),
      sink,
      rx,
      cancel,
    };
    let task = tokio::spawn(actor.run());
    (NotificationEmitter::new(tx), task)
  }

  pub async fn run(mut self) {
    info!(batch_size = self.batch_size, "NotifierActor started");

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => {
              // Deliver what was already queued
              while let Ok(tags) = self.rx.try_recv() {
                  self.deliver(tags).await;
              }
              break;
          }

          batch = self.rx.recv() => match batch {
              Some(tags) => self.deliver(tags).await,
              None => break,
          }
      }
    }

    info!("NotifierActor stopped");
  }

  async fn deliver(&self, tags: Vec<Tag>) {
    for chunk in tags.chunks(self.batch_size) {
      debug!(count = chunk.len(), "Pushing tag deltas");
      if let Err(e) = self.sink.push_tag_deltas(chunk.to_vec()).await {
        warn!(count = chunk.len(), error = %e, "Tag delta push failed, dropping");
      }
    }
  }
}
