//! Assembles stores, the remote client and metrics from a [`Config`].
//!
//! One freshness store is shared by every kind. Entity stores are opened
//! once per kind and reused, so synchronizers built at different times see
//! the same payloads.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::discover::controller::PrefetchController;
use crate::model::entity::{CacheableEntity, EntityKind};
use crate::model::listing::{Match, Property, PropertyOwner, Roommate};
use crate::remote::http::{HttpRemote, RemoteResource};
use crate::store::codec::PayloadCodec;
use crate::store::disk::{DiskEntityStore, DiskFreshnessStore};
use crate::store::memory::{MemoryEntityStore, MemoryFreshnessStore};
use crate::store::{EntityStore, FreshnessStore};
use crate::sync::metrics::SyncMetrics;
use crate::sync::synchronizer::Synchronizer;

pub struct SyncStack {
    config: Arc<Config>,
    freshness: Arc<dyn FreshnessStore>,
    remote: Arc<HttpRemote>,
    metrics: Arc<SyncMetrics>,
    /// `Arc<dyn EntityStore<T>>` per kind, type-erased.
    entity_stores: Mutex<HashMap<EntityKind, Box<dyn Any + Send + Sync>>>,
}

impl SyncStack {
    pub async fn open(config: Arc<Config>) -> anyhow::Result<Self> {
        let freshness: Arc<dyn FreshnessStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryFreshnessStore::new()),
            StorageBackend::Disk => {
                Arc::new(DiskFreshnessStore::open(&config.storage.data_dir).await?)
            }
        };
        let remote = Arc::new(HttpRemote::new(&config.remote)?);
        let metrics = Arc::new(SyncMetrics::new()?);

        info!(
            backend = ?config.storage.backend,
            data_dir = %config.storage.data_dir.display(),
            base_url = %config.remote.base_url,
            "Sync stack ready"
        );

        Ok(Self {
            config,
            freshness,
            remote,
            metrics,
            entity_stores: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> Arc<SyncMetrics> {
        self.metrics.clone()
    }

    /// A synchronizer for `T` over the shared stores and remote.
    pub async fn synchronizer<T>(&self) -> anyhow::Result<Synchronizer<T>>
    where
        T: CacheableEntity + RemoteResource,
    {
        let entities = self.entity_store::<T>().await?;
        Ok(
            Synchronizer::new(self.freshness.clone(), entities, self.remote.clone())
                .with_config(&self.config.cache)
                .with_metrics(self.metrics.clone()),
        )
    }

    /// Start a discover session for a seeker.
    pub fn discover(&self, seeker_id: &str) -> PrefetchController {
        PrefetchController::new_with_metrics(
            seeker_id,
            self.remote.clone(),
            self.config.prefetch.clone(),
            Some(self.metrics.clone()),
        )
    }

    /// Drop every cached payload and freshness record (e.g. on logout).
    pub async fn clear(&self) -> anyhow::Result<()> {
        self.synchronizer::<Property>().await?.invalidate_all().await?;
        self.synchronizer::<Roommate>().await?.invalidate_all().await?;
        self.synchronizer::<PropertyOwner>().await?.invalidate_all().await?;
        self.synchronizer::<Match>().await?.invalidate_all().await?;
        self.freshness.delete_all().await?;
        info!("Cleared local cache");
        Ok(())
    }

    async fn entity_store<T: CacheableEntity>(&self) -> anyhow::Result<Arc<dyn EntityStore<T>>> {
        let mut stores = self.entity_stores.lock().await;
        if let Some(store) = stores
            .get(&T::kind())
            .and_then(|s| s.downcast_ref::<Arc<dyn EntityStore<T>>>())
        {
            return Ok(store.clone());
        }

        let store: Arc<dyn EntityStore<T>> = match self.config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryEntityStore::<T>::new()),
            StorageBackend::Disk => Arc::new(
                DiskEntityStore::<T>::open(
                    &self.config.storage.data_dir,
                    PayloadCodec::from_config(&self.config.storage),
                )
                .await?,
            ),
        };
        stores.insert(T::kind(), Box::new(store.clone()));
        Ok(store)
    }
}
