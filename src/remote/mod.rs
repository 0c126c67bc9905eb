//! The authoritative remote side of the cache.
//!
//! - [`RemoteSource`]: per-kind entity lookups and creation
//! - [`CandidateSource`]: paged discover candidates and swipe decisions
//! - [`http`]: HTTP+JSON client implementing both
//!
//! Timeouts and retries belong to the transport. Callers only see success,
//! absence (`Ok(None)`) or a [`RemoteError`].

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::candidate::{Candidate, SwipeDecision};
use crate::model::entity::CacheableEntity;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

/// Network lookups for one entity kind.
#[async_trait]
pub trait RemoteSource<T: CacheableEntity>: Send + Sync {
    /// `Ok(None)` when the entity does not exist remotely.
    async fn fetch_by_id(&self, entity_id: &str) -> Result<Option<T>, RemoteError>;

    /// Every entity listed under an owner or seeker. `Ok(None)` when the scope is unknown.
    async fn fetch_by_scope(&self, scope_id: &str) -> Result<Option<Vec<T>>, RemoteError>;

    /// Create an entity from a draft, returning the stored version.
    async fn create(&self, draft: &T) -> Result<Option<T>, RemoteError>;
}

/// Paged source of discover candidates for a seeker.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// The next page after whatever the server has already handed out.
    ///
    /// An empty page means the source is exhausted; a failure is an `Err`.
    async fn fetch_next_page(
        &self,
        seeker_id: &str,
        limit: usize,
    ) -> Result<Vec<Candidate>, RemoteError>;

    /// Report the seeker's swipe on a candidate.
    async fn submit_decision(
        &self,
        _seeker_id: &str,
        _candidate_id: &str,
        _decision: SwipeDecision,
    ) -> Result<(), RemoteError> {
        Ok(())
    }
}
