//! Entity types shared by the stores, the remote source and the synchronizer.
//!
//! - [`entity`]: EntityKind, CacheRecord, the CacheableEntity contract
//! - [`listing`]: Property, Roommate, PropertyOwner, Match payloads
//! - [`candidate`]: Discover-queue candidates and swipe decisions

pub mod candidate;
pub mod entity;
pub mod listing;
