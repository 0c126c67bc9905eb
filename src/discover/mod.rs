//! Discover (swipe) queue.
//!
//! - [`controller`]: The prefetch controller that keeps the candidate buffer filled
//! - [`state`]: Observable queue state published to the presentation layer

pub mod controller;
pub mod state;

use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Error, Debug)]
pub enum PrefetchError {
    /// The page request failed. Queue state is unchanged, so a retry is safe.
    #[error("Failed to load candidates: {0}")]
    Remote(#[from] RemoteError),
}
