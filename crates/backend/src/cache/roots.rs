//! Cache of well-known root folder ids.
//!
//! Key: (tenant, scope, user for per-user scopes)
//! Value: root folder id
//!
//! Roots only change on tenant lifecycle events, so entries live for
//! `root_ttl_secs` unless [`RootIdCache::invalidate_tenant`] is called.

use std::sync::Arc;

use moka::future::Cache;
use tracing::{debug, trace, warn};

use crate::{
  domain::{
    config::CacheConfig,
    entry::{EntryId, RootScope, TenantId, UserId},
  },
  store::{Result, RootResolver},
};

type RootKey = (TenantId, RootScope, Option<UserId>);

pub struct RootIdCache {
  resolver: Arc<dyn RootResolver>,
  cache: Cache<RootKey, EntryId>,
}

impl RootIdCache {
  pub fn new(config: &CacheConfig, resolver: Arc<dyn RootResolver>) -> Self {
    Self {
      resolver,
      cache: Cache::builder()
        .max_capacity(config.max_capacity)
        .time_to_live(config.root_ttl())
        .support_invalidation_closures()
        .build(),
    }
  }

  /// Root of `scope` for `user`, resolving through the store on a miss.
  ///
  /// Missing roots are not cached: a personal root is often created lazily
  /// right after the first lookup.
  pub async fn root(&self, tenant: TenantId, scope: RootScope, user: UserId) -> Result<Option<EntryId>> {
    let key = (tenant, scope, scope.is_per_user().then_some(user));
    if let Some(id) = self.cache.get(&key).await {
      return Ok(Some(id));
    }

    let resolved = self.resolver.root_id(tenant, scope, user).await?;
    if let Some(id) = &resolved {
      trace!(tenant = %tenant, scope = %scope, root = %id, "Caching root id");
      self.cache.insert(key, id.clone()).await;
    }
    Ok(resolved)
  }

  /// Drop every cached root of a tenant
  pub fn invalidate_tenant(&self, tenant: TenantId) {
    debug!(tenant = %tenant, "Invalidating cached root ids");
    if let Err(e) = self.cache.invalidate_entries_if(move |key, _| key.0 == tenant) {
      warn!(tenant = %tenant, error = ?e, "Root id invalidation rejected");
    }
  }
}
