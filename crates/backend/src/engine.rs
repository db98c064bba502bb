//! Engine lifecycle: wiring the marker, its lanes and its caches.
//!
//! # Architecture
//!
//! ```text
//! MarkerEngine (Supervisor)
//!   ├── MarkerActor (single lane: fan-out, removals)
//!   ├── NotifierActor (push transport)
//!   ├── CounterCache listener (bus invalidations)
//!   └── FileMarker (shared by the lane and the synchronous read paths)
//! ```
//!
//! # Lifecycle
//!
//! 1. Validate config, create master `CancellationToken`
//! 2. Spawn `NotifierActor` and the counter cache listener with child tokens
//! 3. Create `FileMarker`, spawn `MarkerActor` on it
//! 4. Serve operations: mutations are queued, listings and badges run inline
//! 5. Shutdown: drain the lane, cancel children, wait for tasks
//!
//! Each engine stands for one server process. Engines sharing one
//! [`InvalidationBus`] keep their counter caches coherent.

use std::sync::Arc;

use futures::future::join_all;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
  actor::{MarkerActor, MarkerHandle, NotifierActor},
  cache::{CounterCache, InvalidationBus},
  domain::{
    config::Config,
    entry::{Entry, EntryId, RootScope, TenantId, UserId},
    tag::Tag,
  },
  notify::NotificationSink,
  service::{
    marker::{FileMarker, Listing, MarkTask, MarkerDeps, RootCount},
    util::MarkerError,
  },
};

pub struct MarkerEngine {
  marker: Arc<FileMarker>,
  lane: MarkerHandle,
  lane_task: Mutex<Option<JoinHandle<()>>>,
  background: Mutex<Vec<JoinHandle<()>>>,
  cancel: CancellationToken,
}

impl MarkerEngine {
  /// Start the lanes and the cache listener
  pub fn start(
    config: &Config,
    deps: MarkerDeps,
    bus: Arc<dyn InvalidationBus>,
    sink: Arc<dyn NotificationSink>,
  ) -> Result<Self, MarkerError> {
    config.validate()?;
    let cancel = CancellationToken::new();

    let (notifier, notifier_task) = NotifierActor::spawn(&config.notify, sink, cancel.child_token());
    let counters = Arc::new(CounterCache::new(&config.cache, bus));
    let listener_task = counters.spawn_listener(cancel.child_token());

    let marker = Arc::new(FileMarker::new(deps, &config.cache, counters, notifier));
    let (lane, lane_task) = MarkerActor::spawn(&config.lane, Arc::clone(&marker), cancel.child_token());

    info!(lane = %config.lane.name, "Marker engine started");
    Ok(Self {
      marker,
      lane,
      lane_task: Mutex::new(Some(lane_task)),
      background: Mutex::new(vec![notifier_task, listener_task]),
      cancel,
    })
  }

  // ========================================================================
  // Mutations (queued)
  // ========================================================================

  /// Queue a fan-out of `entry` to `recipients`, or to everyone who can read it.
  ///
  /// Returns once the job is queued. Trashed entries are ignored. Legacy
  /// project entries without explicit recipients go to the project team.
  pub async fn mark_as_new(
    &self,
    tenant: TenantId,
    acting: UserId,
    entry: &Entry,
    recipients: Option<Vec<UserId>>,
  ) -> Result<(), MarkerError> {
    if entry.root_scope == RootScope::Trash {
      return Ok(());
    }

    let recipients = match recipients {
      None if entry.root_scope == RootScope::LegacyProjects => {
        let mut team = self.marker.project_team(entry).await?;
        team.retain(|u| *u != acting);
        if team.is_empty() {
          debug!(entry = %entry.key(), "Project team is empty, nothing to mark");
          return Ok(());
        }
        Some(team)
      }
      other => other,
    };

    let task = MarkTask {
      tenant,
      acting,
      entry: entry.clone(),
      recipients,
    };
    Ok(self.lane.mark_as_new(task).await?)
  }

  /// Queue marking `entry` seen for `user`, the acting user by default
  pub async fn remove_mark_as_new(
    &self,
    tenant: TenantId,
    acting: UserId,
    entry: &Entry,
    user: Option<UserId>,
  ) -> Result<(), MarkerError> {
    let user = user.unwrap_or(acting);
    Ok(self.lane.remove_mark(tenant, entry.clone(), user).await?)
  }

  /// Queue marking `entry` seen for everyone
  pub async fn remove_mark_as_new_for_all(&self, tenant: TenantId, entry: &Entry) -> Result<(), MarkerError> {
    Ok(self.lane.remove_for_all(tenant, entry.clone()).await?)
  }

  // ========================================================================
  // Reads (inline)
  // ========================================================================

  /// Annotate a folder listing and repair the folder's count
  pub async fn set_tags_new(
    &self,
    tenant: TenantId,
    user: UserId,
    parent: &Entry,
    children: Vec<Entry>,
  ) -> Result<Listing, MarkerError> {
    self.marker.set_tags_new(tenant, user, parent, children).await
  }

  pub async fn root_unseen_count(&self, tenant: TenantId, user: UserId, root: &EntryId) -> Result<i64, MarkerError> {
    self.marker.root_unseen_count(tenant, user, root).await
  }

  pub async fn root_summary(&self, tenant: TenantId, user: UserId) -> Result<Vec<RootCount>, MarkerError> {
    self.marker.root_summary(tenant, user).await
  }

  pub async fn marked_items(&self, tenant: TenantId, user: UserId, folder: &Entry) -> Result<Vec<Tag>, MarkerError> {
    self.marker.marked_items(tenant, user, folder).await
  }

  /// Forget cached root ids of a tenant
  pub fn invalidate_roots(&self, tenant: TenantId) {
    self.marker.roots().invalidate_tenant(tenant);
  }

  pub fn counters(&self) -> &Arc<CounterCache> {
    self.marker.counters()
  }

  // ========================================================================
  // Lifecycle
  // ========================================================================

  /// Wait until every job queued before this call has run
  pub async fn flush(&self) -> Result<(), MarkerError> {
    Ok(self.lane.flush().await?)
  }

  /// Run the queued jobs, stop the lane, then stop everything else
  pub async fn shutdown(&self) {
    if let Err(e) = self.lane.shutdown().await {
      debug!(error = %e, "Marker lane already stopped");
    }
    if let Some(task) = self.lane_task.lock().await.take()
      && let Err(e) = task.await
    {
      warn!(error = %e, "Marker lane task failed");
    }

    self.cancel.cancel();
    let tasks: Vec<JoinHandle<()>> = self.background.lock().await.drain(..).collect();
    for result in join_all(tasks).await {
      if let Err(e) = result {
        warn!(error = %e, "Background task failed");
      }
    }
    info!("Marker engine stopped");
  }
}
