//! Prometheus counters for cache and prefetch activity.
//!
//! Metrics live in a registry owned by [`SyncMetrics`] rather than the global
//! default registry, so several sessions can each carry their own.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::model::entity::EntityKind;

#[derive(Clone)]
pub struct SyncMetrics {
    registry: Registry,

    /// Local lookups - labels: kind, outcome (hit/miss)
    cache_lookups_total: IntCounterVec,

    /// Remote calls - labels: kind, op, status (ok/absent/error)
    remote_calls_total: IntCounterVec,

    /// Discover page loads - labels: outcome (page/exhausted/error)
    prefetch_loads_total: IntCounterVec,
}

/// Outcome label for a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Ok,
    Absent,
    Error,
}

impl RemoteOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            RemoteOutcome::Ok => "ok",
            RemoteOutcome::Absent => "absent",
            RemoteOutcome::Error => "error",
        }
    }
}

impl SyncMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cache_lookups_total = IntCounterVec::new(
            Opts::new("roomsync_cache_lookups_total", "Local cache lookups by outcome"),
            &["kind", "outcome"],
        )?;
        let remote_calls_total = IntCounterVec::new(
            Opts::new("roomsync_remote_calls_total", "Remote source calls"),
            &["kind", "op", "status"],
        )?;
        let prefetch_loads_total = IntCounterVec::new(
            Opts::new("roomsync_prefetch_loads_total", "Discover page loads by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(cache_lookups_total.clone()))?;
        registry.register(Box::new(remote_calls_total.clone()))?;
        registry.register(Box::new(prefetch_loads_total.clone()))?;

        Ok(Self {
            registry,
            cache_lookups_total,
            remote_calls_total,
            prefetch_loads_total,
        })
    }

    pub fn record_cache_hit(&self, kind: EntityKind) {
        self.cache_lookups_total
            .with_label_values(&[kind.as_str(), "hit"])
            .inc();
    }

    pub fn record_cache_miss(&self, kind: EntityKind) {
        self.cache_lookups_total
            .with_label_values(&[kind.as_str(), "miss"])
            .inc();
    }

    pub fn record_remote(&self, kind: EntityKind, op: &str, outcome: RemoteOutcome) {
        self.remote_calls_total
            .with_label_values(&[kind.as_str(), op, outcome.as_str()])
            .inc();
    }

    pub fn record_prefetch(&self, outcome: &str) {
        self.prefetch_loads_total.with_label_values(&[outcome]).inc();
    }

    pub fn cache_hits(&self, kind: EntityKind) -> u64 {
        self.cache_lookups_total
            .with_label_values(&[kind.as_str(), "hit"])
            .get()
    }

    pub fn remote_calls(&self, kind: EntityKind, op: &str, outcome: RemoteOutcome) -> u64 {
        self.remote_calls_total
            .with_label_values(&[kind.as_str(), op, outcome.as_str()])
            .get()
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn gather_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for SyncMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncMetrics").finish_non_exhaustive()
    }
}
