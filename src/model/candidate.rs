//! Discover-queue items.

use serde::{Deserialize, Serialize};

/// What a candidate card represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateKind {
    Roommate,
    Property,
}

/// A single card in the swipe queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub kind: CandidateKind,
    pub display_name: String,
    #[serde(default)]
    pub summary: String,
    /// Server-side compatibility score; opaque to the client.
    #[serde(default)]
    pub score: f64,
}

/// The seeker's reaction to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDecision {
    Like,
    Pass,
}

impl std::fmt::Display for SwipeDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwipeDecision::Like => write!(f, "like"),
            SwipeDecision::Pass => write!(f, "pass"),
        }
    }
}
