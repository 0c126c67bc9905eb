//! Disk-backed stores.
//!
//! Layout under the configured data directory:
//!
//! ```text
//! {data_dir}/freshness/{kind}.json        id -> last_updated_at, one index per kind
//! {data_dir}/{kind}/{id}.json[.zst]       one payload file per entity
//! ```
//!
//! Every file is written to a unique temporary name and renamed into place,
//! so readers see either the previous or the new contents, never a torn file.

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::entity::{CacheRecord, CacheableEntity, EntityKind};
use crate::store::codec::{file_stem, PayloadCodec};
use crate::store::{EntityStore, FreshnessStore, StorageError};

type KindIndex = BTreeMap<String, DateTime<Utc>>;

/// Write `data` to `path` through a temporary file and an atomic rename.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    fs::write(&tmp, data).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Freshness records persisted as one JSON index per entity kind.
///
/// The indexes are loaded once at open and kept in memory. A mutation is
/// applied to a copy of the kind's index, written to disk, and only then
/// swapped in, so a failed write leaves memory matching disk.
pub struct DiskFreshnessStore {
    dir: PathBuf,
    index: RwLock<HashMap<EntityKind, KindIndex>>,
}

impl DiskFreshnessStore {
    pub async fn open(data_dir: &Path) -> Result<Self, StorageError> {
        let dir = data_dir.join("freshness");
        fs::create_dir_all(&dir).await?;

        let mut index = HashMap::new();
        for kind in EntityKind::ALL {
            let path = Self::index_path(&dir, kind);
            let data = match fs::read(&path).await {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let records: KindIndex =
                serde_json::from_slice(&data).map_err(|e| StorageError::Corrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            debug!(kind = %kind, records = records.len(), "Loaded freshness index");
            index.insert(kind, records);
        }

        Ok(Self {
            dir,
            index: RwLock::new(index),
        })
    }

    fn index_path(dir: &Path, kind: EntityKind) -> PathBuf {
        dir.join(format!("{}.json", kind.as_str()))
    }

    async fn persist(&self, kind: EntityKind, records: &KindIndex) -> Result<(), StorageError> {
        let path = Self::index_path(&self.dir, kind);
        if records.is_empty() {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }
        let data = serde_json::to_vec(records)?;
        write_atomic(&path, &data).await
    }
}

#[async_trait]
impl FreshnessStore for DiskFreshnessStore {
    async fn put(
        &self,
        kind: EntityKind,
        entity_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut index = self.index.write().await;
        let mut records = index.get(&kind).cloned().unwrap_or_default();
        records.insert(entity_id.to_string(), timestamp);
        self.persist(kind, &records).await?;
        index.insert(kind, records);
        Ok(())
    }

    async fn get(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let index = self.index.read().await;
        Ok(index.get(&kind).and_then(|records| records.get(entity_id)).copied())
    }

    async fn get_all(&self, kind: EntityKind) -> Result<Vec<CacheRecord>, StorageError> {
        let index = self.index.read().await;
        Ok(index
            .get(&kind)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, ts)| CacheRecord::new(kind, id.clone(), *ts))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_one(&self, entity_id: &str) -> Result<(), StorageError> {
        let mut index = self.index.write().await;
        for kind in EntityKind::ALL {
            let Some(current) = index.get(&kind) else {
                continue;
            };
            if !current.contains_key(entity_id) {
                continue;
            }
            let mut records = current.clone();
            records.remove(entity_id);
            self.persist(kind, &records).await?;
            index.insert(kind, records);
        }
        Ok(())
    }

    async fn delete_by_type(&self, kind: EntityKind) -> Result<(), StorageError> {
        let mut index = self.index.write().await;
        self.persist(kind, &KindIndex::new()).await?;
        index.remove(&kind);
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StorageError> {
        let mut index = self.index.write().await;
        for kind in EntityKind::ALL {
            self.persist(kind, &KindIndex::new()).await?;
            index.remove(&kind);
        }
        Ok(())
    }
}

/// Payloads of one entity kind, one file per entity.
pub struct DiskEntityStore<T> {
    dir: PathBuf,
    codec: PayloadCodec,
    _marker: PhantomData<fn() -> T>,
}

impl<T: CacheableEntity> DiskEntityStore<T> {
    pub async fn open(data_dir: &Path, codec: PayloadCodec) -> Result<Self, StorageError> {
        let dir = data_dir.join(T::kind().as_str());
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            codec,
            _marker: PhantomData,
        })
    }

    fn payload_path(&self, entity_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", file_stem(entity_id), self.codec.extension()))
    }

    async fn read_payload(&self, path: &Path) -> Result<Option<T>, StorageError> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.codec.decode(&data).map(Some)
    }
}

#[async_trait]
impl<T: CacheableEntity> EntityStore<T> for DiskEntityStore<T> {
    async fn put(&self, entity_id: &str, payload: &T) -> Result<(), StorageError> {
        let path = self.payload_path(entity_id);
        let data = self.codec.encode(payload)?;
        write_atomic(&path, &data).await?;
        debug!(
            kind = %T::kind(),
            entity_id,
            size = data.len(),
            "Wrote payload to disk"
        );
        Ok(())
    }

    async fn get_by_id(&self, entity_id: &str) -> Result<Option<T>, StorageError> {
        let path = self.payload_path(entity_id);
        self.read_payload(&path).await
    }

    async fn get_all_by_owner(&self, scope_id: &str) -> Result<Vec<T>, StorageError> {
        let suffix = format!(".{}", self.codec.extension());
        let mut matching = Vec::new();

        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            // Skips in-flight temporaries and files written with another codec.
            if !name.ends_with(&suffix) {
                continue;
            }
            let path = entry.path();
            match self.read_payload(&path).await {
                Ok(Some(item)) if item.scope_id() == scope_id => matching.push(item),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), "Unreadable payload during owner scan: {e}");
                    return Err(e);
                }
            }
        }

        matching.sort_by(|a, b| a.entity_id().cmp(b.entity_id()));
        Ok(matching)
    }

    async fn delete(&self, entity_id: &str) -> Result<(), StorageError> {
        let path = self.payload_path(entity_id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(kind = %T::kind(), entity_id, "Deleted payload file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_all(&self) -> Result<(), StorageError> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }
}
