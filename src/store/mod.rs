//! Local persistence for the cache.
//!
//! Two contracts, each with an in-memory and a disk-backed implementation:
//! - [`FreshnessStore`]: `(kind, id) -> last_updated_at`
//! - [`EntityStore`]: `id -> payload`, one store per entity kind
//!
//! - [`memory`]: HashMap/BTreeMap-backed stores
//! - [`disk`]: File-per-entity stores with an optional zstd codec
//! - [`codec`]: Payload encoding for the disk stores

pub mod codec;
pub mod disk;
pub mod memory;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::entity::{CacheRecord, CacheableEntity, EntityKind};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Compression error: {0}")]
    Compression(std::io::Error),

    #[error("Corrupt cache file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Durable `(kind, id) -> last_updated_at` mapping.
///
/// Implementations never touch the network. Writes are upserts with
/// last-write-wins semantics.
#[async_trait]
pub trait FreshnessStore: Send + Sync {
    async fn put(
        &self,
        kind: EntityKind,
        entity_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn get(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Every record of a kind, ordered by entity id.
    async fn get_all(&self, kind: EntityKind) -> Result<Vec<CacheRecord>, StorageError>;

    /// Delete the record for `entity_id` under every kind.
    async fn delete_one(&self, entity_id: &str) -> Result<(), StorageError>;

    async fn delete_by_type(&self, kind: EntityKind) -> Result<(), StorageError>;

    async fn delete_all(&self) -> Result<(), StorageError>;
}

/// Durable `id -> payload` mapping for one entity kind.
#[async_trait]
pub trait EntityStore<T: CacheableEntity>: Send + Sync {
    async fn put(&self, entity_id: &str, payload: &T) -> Result<(), StorageError>;

    async fn get_by_id(&self, entity_id: &str) -> Result<Option<T>, StorageError>;

    /// Every payload whose `scope_id()` equals `scope_id`, ordered by entity id.
    async fn get_all_by_owner(&self, scope_id: &str) -> Result<Vec<T>, StorageError>;

    async fn delete(&self, entity_id: &str) -> Result<(), StorageError>;

    async fn delete_all(&self) -> Result<(), StorageError>;
}
