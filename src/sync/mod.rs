//! Cache-aside synchronization.
//!
//! - [`synchronizer`]: The freshness-gated fetch/reconcile policy, generic over entity kind
//! - [`request`]: Ephemeral sync requests and their responses
//! - [`metrics`]: Prometheus counters for hits, misses and remote calls

pub mod metrics;
pub mod request;
pub mod synchronizer;

use thiserror::Error;

use crate::remote::RemoteError;
use crate::store::StorageError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Local persistence failed. Never swallowed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The remote failed and no cached data could stand in for it.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(#[source] RemoteError),
}
