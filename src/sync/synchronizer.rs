//! The cache-aside synchronizer.
//!
//! One generic policy engine serves every entity kind. For each call it
//! decides whether the local copy can be trusted or the remote must be asked,
//! and writes remote results back into the entity and freshness stores.
//!
//! Single-entity reads favour correctness: a stale or missing entry is never
//! served when the remote fails. Scoped reads favour availability: a remote
//! failure falls back to whatever is cached for the scope.
//!
//! For a given entity the payload is always written before its freshness
//! record, so a fresh record never points at an old or missing payload.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, ScopedRefreshPolicy};
use crate::model::entity::{CacheRead, CacheRecord, CacheableEntity};
use crate::remote::RemoteSource;
use crate::store::{EntityStore, FreshnessStore};
use crate::sync::metrics::{RemoteOutcome, SyncMetrics};
use crate::sync::request::{SyncRequest, SyncResponse, SyncScope};
use crate::sync::SyncError;

pub struct Synchronizer<T: CacheableEntity> {
    freshness: Arc<dyn FreshnessStore>,
    entities: Arc<dyn EntityStore<T>>,
    remote: Arc<dyn RemoteSource<T>>,
    scoped_refresh: ScopedRefreshPolicy,
    metrics: Option<Arc<SyncMetrics>>,
}

impl<T: CacheableEntity> Synchronizer<T> {
    pub fn new(
        freshness: Arc<dyn FreshnessStore>,
        entities: Arc<dyn EntityStore<T>>,
        remote: Arc<dyn RemoteSource<T>>,
    ) -> Self {
        Self {
            freshness,
            entities,
            remote,
            scoped_refresh: ScopedRefreshPolicy::default(),
            metrics: None,
        }
    }

    pub fn with_config(mut self, config: &CacheConfig) -> Self {
        self.scoped_refresh = config.scoped_refresh;
        self
    }

    pub fn with_scoped_refresh(mut self, policy: ScopedRefreshPolicy) -> Self {
        self.scoped_refresh = policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Fetch one entity, serving the local copy only while it is fresh.
    ///
    /// Returns `Ok(None)` when the entity needed a refetch and the remote
    /// either does not have it or failed. Storage failures are errors.
    pub async fn fetch_one(
        &self,
        entity_id: &str,
        force_refresh: bool,
        max_age: Duration,
    ) -> Result<Option<T>, SyncError> {
        let kind = T::kind();

        if !force_refresh {
            if let Some(cached) = self.fresh_local(entity_id, max_age).await? {
                debug!(kind = %kind, entity_id, "Serving fresh cached entity");
                self.metric(|m| m.record_cache_hit(kind));
                return Ok(Some(cached));
            }
        }
        self.metric(|m| m.record_cache_miss(kind));

        match self.remote.fetch_by_id(entity_id).await {
            Ok(Some(entity)) => {
                self.reconcile(&entity).await?;
                self.metric(|m| m.record_remote(kind, "fetch_one", RemoteOutcome::Ok));
                Ok(Some(entity))
            }
            Ok(None) => {
                debug!(kind = %kind, entity_id, "Entity not found remotely");
                self.metric(|m| m.record_remote(kind, "fetch_one", RemoteOutcome::Absent));
                Ok(None)
            }
            Err(e) => {
                warn!(kind = %kind, entity_id, "Remote fetch failed: {e}");
                self.metric(|m| m.record_remote(kind, "fetch_one", RemoteOutcome::Error));
                Ok(None)
            }
        }
    }

    /// Fetch every entity listed under `scope_id`.
    ///
    /// Freshness is all-or-nothing across the cached records of this kind.
    /// Whether a fresh or a stale cache triggers the remote call is decided
    /// by the configured [`ScopedRefreshPolicy`]. Under
    /// [`WhenStale`](ScopedRefreshPolicy::WhenStale) a scope with nothing
    /// cached is also refreshed.
    ///
    /// On remote failure the cached members of the scope are returned if
    /// there are any. With nothing cached, remote absence is `Ok(None)` and
    /// remote failure is [`SyncError::RemoteUnavailable`].
    pub async fn fetch_scoped(
        &self,
        scope_id: &str,
        force_refresh: bool,
        max_age: Duration,
    ) -> Result<Option<Vec<T>>, SyncError> {
        let kind = T::kind();
        let now = Utc::now();

        let resolved = self.resolve_cached().await?;
        let is_fresh = resolved
            .iter()
            .all(|(record, _)| record.is_fresh(now, max_age));
        let local: Vec<T> = resolved
            .into_iter()
            .map(|(_, item)| item)
            .filter(|item| item.scope_id() == scope_id)
            .collect();

        let should_refresh = force_refresh
            || match self.scoped_refresh {
                ScopedRefreshPolicy::WhenFresh => is_fresh,
                ScopedRefreshPolicy::WhenStale => !is_fresh || local.is_empty(),
            };

        if !should_refresh {
            debug!(kind = %kind, scope_id, cached = local.len(), "Serving cached scope");
            self.metric(|m| m.record_cache_hit(kind));
            return Ok(Some(local));
        }
        self.metric(|m| m.record_cache_miss(kind));

        let failure = match self.remote.fetch_by_scope(scope_id).await {
            Ok(Some(items)) => {
                for item in &items {
                    self.reconcile(item).await?;
                }
                debug!(kind = %kind, scope_id, count = items.len(), "Refreshed scope from remote");
                self.metric(|m| m.record_remote(kind, "fetch_scoped", RemoteOutcome::Ok));
                return Ok(Some(items));
            }
            Ok(None) => {
                self.metric(|m| m.record_remote(kind, "fetch_scoped", RemoteOutcome::Absent));
                None
            }
            Err(e) => {
                warn!(kind = %kind, scope_id, "Remote scoped fetch failed: {e}");
                self.metric(|m| m.record_remote(kind, "fetch_scoped", RemoteOutcome::Error));
                Some(e)
            }
        };

        if !local.is_empty() {
            info!(kind = %kind, scope_id, cached = local.len(), "Falling back to cached scope");
            return Ok(Some(local));
        }
        match failure {
            Some(e) => Err(SyncError::RemoteUnavailable(e)),
            None => Ok(None),
        }
    }

    /// Create an entity remotely and cache the stored version.
    ///
    /// Returns whether the remote accepted it.
    pub async fn add_one(&self, draft: &T) -> Result<bool, SyncError> {
        let kind = T::kind();
        match self.remote.create(draft).await {
            Ok(Some(created)) => {
                self.reconcile(&created).await?;
                self.metric(|m| m.record_remote(kind, "create", RemoteOutcome::Ok));
                info!(kind = %kind, entity_id = created.entity_id(), "Created entity");
                Ok(true)
            }
            Ok(None) => {
                self.metric(|m| m.record_remote(kind, "create", RemoteOutcome::Absent));
                Ok(false)
            }
            Err(e) => {
                warn!(kind = %kind, entity_id = draft.entity_id(), "Remote create failed: {e}");
                self.metric(|m| m.record_remote(kind, "create", RemoteOutcome::Error));
                Ok(false)
            }
        }
    }

    /// Dispatch a [`SyncRequest`] to [`fetch_one`](Self::fetch_one) or
    /// [`fetch_scoped`](Self::fetch_scoped).
    pub async fn execute(&self, request: &SyncRequest) -> Result<SyncResponse<T>, SyncError> {
        match &request.scope {
            SyncScope::Entity(id) => Ok(self
                .fetch_one(id, request.force_refresh, request.max_age)
                .await?
                .map_or(SyncResponse::NotFound, SyncResponse::One)),
            SyncScope::Owner(scope_id) => Ok(self
                .fetch_scoped(scope_id, request.force_refresh, request.max_age)
                .await?
                .map_or(SyncResponse::NotFound, SyncResponse::Many)),
        }
    }

    /// The cached value and when it was stored, regardless of age. No network.
    pub async fn peek(&self, entity_id: &str) -> Result<Option<CacheRead<T>>, SyncError> {
        let Some(cached_at) = self.freshness.get(T::kind(), entity_id).await? else {
            return Ok(None);
        };
        Ok(self
            .entities
            .get_by_id(entity_id)
            .await?
            .map(|value| CacheRead::new(value, cached_at)))
    }

    /// Every cached payload of a scope, regardless of age. No network.
    pub async fn peek_scope(&self, scope_id: &str) -> Result<Vec<T>, SyncError> {
        Ok(self.entities.get_all_by_owner(scope_id).await?)
    }

    /// Drop one entity from the cache.
    pub async fn invalidate(&self, entity_id: &str) -> Result<(), SyncError> {
        // Record first, so a reader never sees a record without its payload.
        self.freshness.delete_one(entity_id).await?;
        self.entities.delete(entity_id).await?;
        debug!(kind = %T::kind(), entity_id, "Invalidated entity");
        Ok(())
    }

    /// Drop every cached entity of this kind.
    pub async fn invalidate_all(&self) -> Result<(), SyncError> {
        self.freshness.delete_by_type(T::kind()).await?;
        self.entities.delete_all().await?;
        info!(kind = %T::kind(), "Invalidated all cached entities");
        Ok(())
    }

    /// Pull-to-refresh: clear this kind, then repopulate the scope from the remote.
    pub async fn refresh_scope(
        &self,
        scope_id: &str,
        max_age: Duration,
    ) -> Result<Option<Vec<T>>, SyncError> {
        self.invalidate_all().await?;
        self.fetch_scoped(scope_id, true, max_age).await
    }

    /// The local payload if its record exists and is within `max_age`.
    ///
    /// A record whose payload is gone counts as a miss.
    async fn fresh_local(&self, entity_id: &str, max_age: Duration) -> Result<Option<T>, SyncError> {
        let kind = T::kind();
        let Some(updated_at) = self.freshness.get(kind, entity_id).await? else {
            return Ok(None);
        };
        let record = CacheRecord::new(kind, entity_id, updated_at);
        if !record.is_fresh(Utc::now(), max_age) {
            debug!(kind = %kind, entity_id, age_ms = record.age(Utc::now()).as_millis() as u64, "Cached entity is stale");
            return Ok(None);
        }
        let payload = self.entities.get_by_id(entity_id).await?;
        if payload.is_none() {
            debug!(kind = %kind, entity_id, "Freshness record without payload, refetching");
        }
        Ok(payload)
    }

    /// Every record of this kind paired with its payload. Records without a
    /// payload are skipped; the next successful sync rewrites them.
    async fn resolve_cached(&self) -> Result<Vec<(CacheRecord, T)>, SyncError> {
        let records = self.freshness.get_all(T::kind()).await?;
        let mut resolved = Vec::with_capacity(records.len());
        for record in records {
            match self.entities.get_by_id(&record.entity_id).await? {
                Some(item) => resolved.push((record, item)),
                None => debug!(
                    kind = %record.entity_type,
                    entity_id = %record.entity_id,
                    "Skipping freshness record without payload"
                ),
            }
        }
        Ok(resolved)
    }

    /// Write a remote result back: payload first, then its freshness record.
    async fn reconcile(&self, entity: &T) -> Result<(), SyncError> {
        let entity_id = entity.entity_id();
        self.entities.put(entity_id, entity).await?;
        self.freshness.put(T::kind(), entity_id, Utc::now()).await?;
        Ok(())
    }

    fn metric(&self, f: impl FnOnce(&SyncMetrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}
