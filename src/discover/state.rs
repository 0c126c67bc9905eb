//! Published queue state.

/// Snapshot of the controller, pushed to subscribers on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueState {
    /// A page request is in flight.
    pub is_loading: bool,
    /// The source reported no more candidates. Terminal until reset.
    pub is_exhausted: bool,
    /// Candidates currently buffered.
    pub buffered: usize,
    /// The most recent load failure, cleared by the next successful load.
    pub last_error: Option<String>,
}

/// What the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    /// Cards are available.
    Ready,
    /// Nothing to show yet, a load is running.
    Loading,
    /// Nothing to show and the last load failed; offer a retry.
    Failed,
    /// Nothing to show and nothing more will come.
    Exhausted,
    /// Nothing buffered and nothing running.
    Empty,
}

impl QueueState {
    pub fn phase(&self) -> QueuePhase {
        if self.buffered > 0 {
            QueuePhase::Ready
        } else if self.is_loading {
            QueuePhase::Loading
        } else if self.is_exhausted {
            QueuePhase::Exhausted
        } else if self.last_error.is_some() {
            QueuePhase::Failed
        } else {
            QueuePhase::Empty
        }
    }
}
