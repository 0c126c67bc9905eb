//! Entity kinds, freshness records and the cacheable-entity contract.
//!
//! Every payload that flows through the synchronizer carries an id, a kind
//! and a scope (the owner or seeker it belongs to). Nothing else about the
//! payload is visible to the cache.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Closed set of entity kinds that the cache namespaces by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Property,
    Roommate,
    PropertyOwner,
    Match,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Property,
        EntityKind::Roommate,
        EntityKind::PropertyOwner,
        EntityKind::Match,
    ];

    /// Stable lowercase name, used for directory names and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Property => "property",
            EntityKind::Roommate => "roommate",
            EntityKind::PropertyOwner => "property_owner",
            EntityKind::Match => "match",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Property => write!(f, "PROPERTY"),
            EntityKind::Roommate => write!(f, "ROOMMATE"),
            EntityKind::PropertyOwner => write!(f, "PROPERTY_OWNER"),
            EntityKind::Match => write!(f, "MATCH"),
        }
    }
}

/// When an entity last passed through the synchronizer.
///
/// Unique on `(entity_type, entity_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub entity_type: EntityKind,
    pub entity_id: String,
    pub last_updated_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn new(entity_type: EntityKind, entity_id: impl Into<String>, last_updated_at: DateTime<Utc>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            last_updated_at,
        }
    }

    /// Time elapsed since the last update. Clock skew into the future counts as zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_updated_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether `now - last_updated_at <= max_age`.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) <= max_age
    }
}

/// Contract for payloads the synchronizer can cache.
///
/// - `kind()` must be the same for every value of the type
/// - `entity_id()` is unique within the kind
/// - `scope_id()` is the owner or seeker the entity is listed under
pub trait CacheableEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn kind() -> EntityKind;

    fn entity_id(&self) -> &str;

    fn scope_id(&self) -> &str;
}

/// A locally cached value together with its freshness record.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    cached_at: DateTime<Utc>,
}

impl<T> CacheRead<T> {
    pub fn new(value: T, cached_at: DateTime<Utc>) -> Self {
        Self { value, cached_at }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    /// How long ago the value was cached.
    pub fn staleness(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}
