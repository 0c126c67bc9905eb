//! Cached payload types for properties, roommates, owners and matches.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::entity::{CacheableEntity, EntityKind};

/// A rentable property, listed under its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub address: String,
    /// Monthly rent in cents.
    pub rent_cents: u64,
    pub available_from: Option<NaiveDate>,
    #[serde(default)]
    pub amenities: Vec<String>,
}

/// A prospective roommate as seen by one seeker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roommate {
    pub id: String,
    pub seeker_id: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    pub budget_cents: u64,
    /// Whether the seeker liked this roommate.
    #[serde(default)]
    pub liked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyOwner {
    pub id: String,
    pub display_name: String,
    pub contact_email: String,
}

/// A server-computed match for a seeker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub seeker_id: String,
    pub candidate_id: String,
    pub property_id: Option<String>,
    pub score: f64,
    pub matched_at: DateTime<Utc>,
}

impl CacheableEntity for Property {
    fn kind() -> EntityKind {
        EntityKind::Property
    }

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> &str {
        &self.owner_id
    }
}

impl CacheableEntity for Roommate {
    fn kind() -> EntityKind {
        EntityKind::Roommate
    }

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> &str {
        &self.seeker_id
    }
}

impl CacheableEntity for PropertyOwner {
    fn kind() -> EntityKind {
        EntityKind::PropertyOwner
    }

    fn entity_id(&self) -> &str {
        &self.id
    }

    // Owners are their own scope.
    fn scope_id(&self) -> &str {
        &self.id
    }
}

impl CacheableEntity for Match {
    fn kind() -> EntityKind {
        EntityKind::Match
    }

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> &str {
        &self.seeker_id
    }
}
