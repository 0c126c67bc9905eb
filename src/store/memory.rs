//! In-memory stores.
//!
//! Used by tests and by sessions that do not need the cache to survive a
//! restart. Ordered maps keep `get_all` results deterministic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::entity::{CacheRecord, CacheableEntity, EntityKind};
use crate::store::{EntityStore, FreshnessStore, StorageError};

#[derive(Debug, Default)]
pub struct MemoryFreshnessStore {
    records: RwLock<BTreeMap<(EntityKind, String), DateTime<Utc>>>,
}

impl MemoryFreshnessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all kinds.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl FreshnessStore for MemoryFreshnessStore {
    async fn put(
        &self,
        kind: EntityKind,
        entity_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .insert((kind, entity_id.to_string()), timestamp);
        Ok(())
    }

    async fn get(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self
            .records
            .read()
            .await
            .get(&(kind, entity_id.to_string()))
            .copied())
    }

    async fn get_all(&self, kind: EntityKind) -> Result<Vec<CacheRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((k, id), ts)| CacheRecord::new(*k, id.clone(), *ts))
            .collect())
    }

    async fn delete_one(&self, entity_id: &str) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .retain(|(_, id), _| id != entity_id);
        Ok(())
    }

    async fn delete_by_type(&self, kind: EntityKind) -> Result<(), StorageError> {
        self.records.write().await.retain(|(k, _), _| *k != kind);
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StorageError> {
        self.records.write().await.clear();
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryEntityStore<T> {
    items: RwLock<BTreeMap<String, T>>,
}

impl<T> Default for MemoryEntityStore<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T> MemoryEntityStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl<T: CacheableEntity> EntityStore<T> for MemoryEntityStore<T> {
    async fn put(&self, entity_id: &str, payload: &T) -> Result<(), StorageError> {
        self.items
            .write()
            .await
            .insert(entity_id.to_string(), payload.clone());
        Ok(())
    }

    async fn get_by_id(&self, entity_id: &str) -> Result<Option<T>, StorageError> {
        Ok(self.items.read().await.get(entity_id).cloned())
    }

    async fn get_all_by_owner(&self, scope_id: &str) -> Result<Vec<T>, StorageError> {
        Ok(self
            .items
            .read()
            .await
            .values()
            .filter(|item| item.scope_id() == scope_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, entity_id: &str) -> Result<(), StorageError> {
        self.items.write().await.remove(entity_id);
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StorageError> {
        self.items.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::listing::PropertyOwner;

    fn owner(id: &str) -> PropertyOwner {
        PropertyOwner {
            id: id.to_string(),
            display_name: format!("Owner {id}"),
            contact_email: format!("{id}@example.com"),
        }
    }

    #[tokio::test]
    async fn test_freshness_last_write_wins() {
        let store = MemoryFreshnessStore::new();
        let first = Utc::now() - chrono::Duration::seconds(60);
        let second = Utc::now();

        store.put(EntityKind::Property, "p1", first).await.unwrap();
        store.put(EntityKind::Property, "p1", second).await.unwrap();

        assert_eq!(store.get(EntityKind::Property, "p1").await.unwrap(), Some(second));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_freshness_delete_one_spans_kinds() {
        let store = MemoryFreshnessStore::new();
        let now = Utc::now();
        store.put(EntityKind::Property, "x", now).await.unwrap();
        store.put(EntityKind::Match, "x", now).await.unwrap();
        store.put(EntityKind::Match, "y", now).await.unwrap();

        store.delete_one("x").await.unwrap();

        assert!(store.get(EntityKind::Property, "x").await.unwrap().is_none());
        assert!(store.get(EntityKind::Match, "x").await.unwrap().is_none());
        assert_eq!(store.get_all(EntityKind::Match).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_freshness_delete_by_type() {
        let store = MemoryFreshnessStore::new();
        let now = Utc::now();
        store.put(EntityKind::Property, "p1", now).await.unwrap();
        store.put(EntityKind::Roommate, "r1", now).await.unwrap();

        store.delete_by_type(EntityKind::Property).await.unwrap();

        assert!(store.get_all(EntityKind::Property).await.unwrap().is_empty());
        assert_eq!(store.get_all(EntityKind::Roommate).await.unwrap().len(), 1);

        store.delete_all().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_entity_store_scope_filter() {
        let store = MemoryEntityStore::<PropertyOwner>::new();
        store.put("o1", &owner("o1")).await.unwrap();
        store.put("o2", &owner("o2")).await.unwrap();

        let scoped = store.get_all_by_owner("o2").await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, "o2");

        store.delete("o2").await.unwrap();
        assert!(store.get_by_id("o2").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }
}
