//! Prefetch controller for the discover queue.
//!
//! Keeps an ordered buffer of candidates for one seeker and refills it in the
//! background before it runs dry:
//! 1. Construction starts the initial page load
//! 2. Each swipe pops the front card
//! 3. At or below the low-water mark, one refill is started
//! 4. An empty page marks the queue exhausted for good
//!
//! At most one page request is in flight at a time. The `in_flight` flag is
//! claimed with a compare-and-swap before any request starts and released by
//! a guard on drop, so a cancelled or aborted load never wedges the queue.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::config::PrefetchConfig;
use crate::discover::state::QueueState;
use crate::discover::PrefetchError;
use crate::model::candidate::{Candidate, SwipeDecision};
use crate::remote::CandidateSource;
use crate::sync::metrics::SyncMetrics;

/// Result of a [`PrefetchController::load_more`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page arrived; `added` candidates were appended.
    Loaded { added: usize },
    /// The source has nothing more. No request was made if it already was.
    Exhausted,
    /// Another load was already running; nothing was requested.
    AlreadyInFlight,
    /// The queue was reset while this load ran; its page was discarded.
    Superseded,
}

/// State shared between the controller and its background loads.
struct Shared {
    seeker_id: String,
    source: Arc<dyn CandidateSource>,
    config: PrefetchConfig,
    metrics: Option<Arc<SyncMetrics>>,

    buffer: Mutex<VecDeque<Candidate>>,
    buffered: AtomicUsize,
    in_flight: AtomicBool,
    exhausted: AtomicBool,
    /// Bumped by reset; loads started under an older generation are discarded.
    generation: AtomicU64,

    state_tx: watch::Sender<QueueState>,
}

/// Releases the single-flight claim when dropped, including on cancellation.
struct InFlightGuard {
    shared: Arc<Shared>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shared.in_flight.store(false, Ordering::Release);
        self.shared.publish();
    }
}

impl Shared {
    /// Claim the single-flight slot, unless exhausted or already loading.
    fn try_claim(self: &Arc<Self>) -> Option<InFlightGuard> {
        if self.exhausted.load(Ordering::Acquire) {
            return None;
        }
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.publish();
        Some(InFlightGuard {
            shared: self.clone(),
        })
    }

    /// Fetch one page while holding the claim. Queue state is only touched
    /// after the remote call completes.
    async fn fetch_page(&self, guard: InFlightGuard) -> Result<LoadOutcome, PrefetchError> {
        let generation = self.generation.load(Ordering::Acquire);
        let result = self
            .source
            .fetch_next_page(&self.seeker_id, self.config.page_size.max(1))
            .await;

        let outcome = match result {
            Ok(_) if self.generation.load(Ordering::Acquire) != generation => {
                debug!(seeker_id = %self.seeker_id, "Discarding page from before reset");
                Ok(LoadOutcome::Superseded)
            }
            Ok(page) if page.is_empty() => {
                self.exhausted.store(true, Ordering::Release);
                self.set_error(None);
                self.metric("exhausted");
                info!(seeker_id = %self.seeker_id, "Candidate source exhausted");
                Ok(LoadOutcome::Exhausted)
            }
            Ok(page) => {
                let received = page.len();
                let added = self.append(page).await;
                self.set_error(None);
                self.metric("page");
                debug!(
                    seeker_id = %self.seeker_id,
                    received,
                    added,
                    buffered = self.buffered.load(Ordering::Acquire),
                    "Loaded candidate page"
                );
                Ok(LoadOutcome::Loaded { added })
            }
            Err(e) if self.generation.load(Ordering::Acquire) != generation => {
                debug!(seeker_id = %self.seeker_id, "Dropping page error from before reset: {e}");
                Ok(LoadOutcome::Superseded)
            }
            Err(e) => {
                warn!(seeker_id = %self.seeker_id, "Candidate page load failed: {e}");
                self.set_error(Some(e.to_string()));
                self.metric("error");
                Err(PrefetchError::Remote(e))
            }
        };

        drop(guard);
        outcome
    }

    /// Append in server order, skipping ids already live in the buffer.
    async fn append(&self, page: Vec<Candidate>) -> usize {
        let mut buffer = self.buffer.lock().await;
        let mut live: HashSet<String> = buffer.iter().map(|c| c.id.clone()).collect();
        let mut added = 0;
        for candidate in page {
            if live.insert(candidate.id.clone()) {
                buffer.push_back(candidate);
                added += 1;
            } else {
                debug!(candidate_id = %candidate.id, "Skipping duplicate candidate");
            }
        }
        self.buffered.store(buffer.len(), Ordering::Release);
        added
    }

    fn set_error(&self, error: Option<String>) {
        self.state_tx.send_if_modified(|state| {
            if state.last_error == error {
                return false;
            }
            state.last_error = error;
            true
        });
    }

    /// Push the current flags to subscribers if anything changed.
    fn publish(&self) {
        let is_loading = self.in_flight.load(Ordering::Acquire);
        let is_exhausted = self.exhausted.load(Ordering::Acquire);
        let buffered = self.buffered.load(Ordering::Acquire);
        self.state_tx.send_if_modified(|state| {
            let changed = state.is_loading != is_loading
                || state.is_exhausted != is_exhausted
                || state.buffered != buffered;
            state.is_loading = is_loading;
            state.is_exhausted = is_exhausted;
            state.buffered = buffered;
            changed
        });
    }

    fn metric(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_prefetch(outcome);
        }
    }
}

/// Discover queue for one seeker.
///
/// Must be created inside a tokio runtime. Dropping the controller aborts
/// its background loads and pending decision submissions.
/// [`dispose`](Self::dispose) aborts the loads but lets submissions finish.
pub struct PrefetchController {
    shared: Arc<Shared>,
    tasks: Mutex<JoinSet<()>>,
    /// Swipe decisions still being reported to the source.
    decisions: Mutex<JoinSet<()>>,
}

impl PrefetchController {
    /// Create the controller and start the initial page load.
    pub fn new(
        seeker_id: impl Into<String>,
        source: Arc<dyn CandidateSource>,
        config: PrefetchConfig,
    ) -> Self {
        Self::new_with_metrics(seeker_id, source, config, None)
    }

    pub fn new_with_metrics(
        seeker_id: impl Into<String>,
        source: Arc<dyn CandidateSource>,
        config: PrefetchConfig,
        metrics: Option<Arc<SyncMetrics>>,
    ) -> Self {
        let (state_tx, _) = watch::channel(QueueState::default());
        let shared = Arc::new(Shared {
            seeker_id: seeker_id.into(),
            source,
            config,
            metrics,
            buffer: Mutex::new(VecDeque::new()),
            buffered: AtomicUsize::new(0),
            in_flight: AtomicBool::new(false),
            exhausted: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            state_tx,
        });

        let mut tasks = JoinSet::new();
        Self::spawn_load(&shared, &mut tasks);
        info!(seeker_id = %shared.seeker_id, "Discover session started");

        Self {
            shared,
            tasks: Mutex::new(tasks),
            decisions: Mutex::new(JoinSet::new()),
        }
    }

    pub fn seeker_id(&self) -> &str {
        &self.shared.seeker_id
    }

    /// Read-only snapshot of the buffered candidates, front first.
    pub async fn current(&self) -> Vec<Candidate> {
        self.shared.buffer.lock().await.iter().cloned().collect()
    }

    /// Current queue state.
    pub fn state(&self) -> QueueState {
        self.shared.state_tx.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.shared.state_tx.subscribe()
    }

    /// State changes as a stream, starting with the current state.
    pub fn state_stream(&self) -> WatchStream<QueueState> {
        WatchStream::new(self.subscribe())
    }

    /// Swipe the front card.
    ///
    /// Pops and returns the front candidate (if any), reports the decision
    /// in the background, and starts a refill when the buffer is at or below
    /// the low-water mark and no load is running.
    pub async fn on_consume(&self, decision: SwipeDecision) -> Option<Candidate> {
        let (popped, remaining) = {
            let mut buffer = self.shared.buffer.lock().await;
            let popped = buffer.pop_front();
            self.shared.buffered.store(buffer.len(), Ordering::Release);
            (popped, buffer.len())
        };

        if let Some(candidate) = &popped {
            self.report_decision(candidate, decision).await;
        }

        if remaining <= self.shared.config.low_water_mark {
            let mut tasks = self.tasks.lock().await;
            while tasks.try_join_next().is_some() {}
            Self::spawn_load(&self.shared, &mut tasks);
        }

        self.shared.publish();
        popped
    }

    /// Load the next page now, e.g. a manual retry after a failure.
    ///
    /// Returns without a request when exhausted or when a load is already
    /// running. Dropping the returned future cancels the load and releases
    /// the single-flight claim.
    pub async fn load_more(&self) -> Result<LoadOutcome, PrefetchError> {
        if self.shared.exhausted.load(Ordering::Acquire) {
            return Ok(LoadOutcome::Exhausted);
        }
        match self.shared.try_claim() {
            Some(guard) => self.shared.fetch_page(guard).await,
            None if self.shared.exhausted.load(Ordering::Acquire) => Ok(LoadOutcome::Exhausted),
            None => Ok(LoadOutcome::AlreadyInFlight),
        }
    }

    /// Start over: abort background loads, clear the buffer and the
    /// exhausted flag, then load the first page again. Decisions already
    /// swiped are still reported.
    pub async fn reset(&self) {
        let mut tasks = self.tasks.lock().await;
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}

        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        {
            let mut buffer = self.shared.buffer.lock().await;
            buffer.clear();
            self.shared.buffered.store(0, Ordering::Release);
        }
        self.shared.exhausted.store(false, Ordering::Release);
        self.shared.set_error(None);
        self.shared.publish();

        info!(seeker_id = %self.shared.seeker_id, "Discover session reset");
        Self::spawn_load(&self.shared, &mut tasks);
    }

    /// End the session: abort any background load, then wait for pending
    /// decision submissions.
    pub async fn dispose(self) {
        {
            let mut tasks = self.tasks.lock().await;
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
        let mut decisions = self.decisions.lock().await;
        let pending = decisions.len();
        while decisions.join_next().await.is_some() {}
        info!(seeker_id = %self.shared.seeker_id, pending, "Discover session disposed");
    }

    /// Spawn a background load if the single-flight slot can be claimed.
    fn spawn_load(shared: &Arc<Shared>, tasks: &mut JoinSet<()>) {
        let Some(guard) = shared.try_claim() else {
            return;
        };
        let shared = shared.clone();
        tasks.spawn(async move {
            // Failures are already published through the queue state.
            let _ = shared.fetch_page(guard).await;
        });
    }

    async fn report_decision(&self, candidate: &Candidate, decision: SwipeDecision) {
        let source = self.shared.source.clone();
        let seeker_id = self.shared.seeker_id.clone();
        let candidate_id = candidate.id.clone();
        let mut decisions = self.decisions.lock().await;
        while decisions.try_join_next().is_some() {}
        decisions.spawn(async move {
            if let Err(e) = source
                .submit_decision(&seeker_id, &candidate_id, decision)
                .await
            {
                warn!(seeker_id = %seeker_id, candidate_id = %candidate_id, %decision, "Failed to submit swipe decision: {e}");
            }
        });
    }
}
