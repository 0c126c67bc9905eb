//! roomsync: client-side data synchronization for roommate matching.
//!
//! Two pieces share one contract, freshness-gated fetch with single-flight
//! refresh:
//!   - a cache-aside [`Synchronizer`](sync::synchronizer::Synchronizer) that
//!     decides per entity whether the local copy is trustworthy or the remote
//!     must be asked, and writes results back
//!   - a [`PrefetchController`](discover::controller::PrefetchController) that
//!     keeps the discover (swipe) queue filled without overlapping requests
//!
//! Storage and transport sit behind traits ([`store`], [`remote`]); in-memory,
//! disk and HTTP implementations are provided.

pub mod config;
pub mod discover;
pub mod model;
pub mod remote;
pub mod stack;
pub mod store;
pub mod sync;

pub use config::Config;
pub use discover::controller::{LoadOutcome, PrefetchController};
pub use discover::state::{QueuePhase, QueueState};
pub use model::candidate::{Candidate, CandidateKind, SwipeDecision};
pub use model::entity::{CacheRead, CacheRecord, CacheableEntity, EntityKind};
pub use sync::synchronizer::Synchronizer;
pub use sync::SyncError;
