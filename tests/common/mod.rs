//! Shared fixtures: call-counting remotes and stores that log write order.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use roomsync::model::candidate::{Candidate, CandidateKind, SwipeDecision};
use roomsync::model::entity::{CacheRecord, CacheableEntity, EntityKind};
use roomsync::model::listing::{Match, Property};
use roomsync::remote::{CandidateSource, RemoteError, RemoteSource};
use roomsync::store::memory::{MemoryEntityStore, MemoryFreshnessStore};
use roomsync::store::{EntityStore, FreshnessStore, StorageError};
use roomsync::Synchronizer;

pub const MAX_AGE: Duration = Duration::from_secs(300);

/// How a [`MockRemote`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Serve,
    Absent,
    Fail,
}

/// Remote that serves from a map and counts every call.
pub struct MockRemote<T> {
    items: Mutex<BTreeMap<String, T>>,
    reply: Mutex<Reply>,
    pub by_id_calls: AtomicUsize,
    pub by_scope_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
}

impl<T: CacheableEntity> MockRemote<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Mutex::new(
                items
                    .into_iter()
                    .map(|item| (item.entity_id().to_string(), item))
                    .collect(),
            ),
            reply: Mutex::new(Reply::Serve),
            by_id_calls: AtomicUsize::new(0),
            by_scope_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn upsert(&self, item: T) {
        self.items
            .lock()
            .unwrap()
            .insert(item.entity_id().to_string(), item);
    }

    pub fn calls(&self) -> usize {
        self.by_id_calls.load(Ordering::SeqCst)
            + self.by_scope_calls.load(Ordering::SeqCst)
            + self.create_calls.load(Ordering::SeqCst)
    }

    fn reply(&self) -> Reply {
        *self.reply.lock().unwrap()
    }
}

#[async_trait]
impl<T: CacheableEntity> RemoteSource<T> for MockRemote<T> {
    async fn fetch_by_id(&self, entity_id: &str) -> Result<Option<T>, RemoteError> {
        self.by_id_calls.fetch_add(1, Ordering::SeqCst);
        match self.reply() {
            Reply::Serve => Ok(self.items.lock().unwrap().get(entity_id).cloned()),
            Reply::Absent => Ok(None),
            Reply::Fail => Err(RemoteError::Unavailable("offline".into())),
        }
    }

    async fn fetch_by_scope(&self, scope_id: &str) -> Result<Option<Vec<T>>, RemoteError> {
        self.by_scope_calls.fetch_add(1, Ordering::SeqCst);
        match self.reply() {
            Reply::Serve => Ok(Some(
                self.items
                    .lock()
                    .unwrap()
                    .values()
                    .filter(|item| item.scope_id() == scope_id)
                    .cloned()
                    .collect(),
            )),
            Reply::Absent => Ok(None),
            Reply::Fail => Err(RemoteError::Unavailable("offline".into())),
        }
    }

    async fn create(&self, draft: &T) -> Result<Option<T>, RemoteError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        match self.reply() {
            Reply::Serve => {
                self.upsert(draft.clone());
                Ok(Some(draft.clone()))
            }
            Reply::Absent => Ok(None),
            Reply::Fail => Err(RemoteError::Unavailable("offline".into())),
        }
    }
}

/// A synchronizer over memory stores, with handles to every collaborator.
pub struct Harness<T: CacheableEntity> {
    pub sync: Synchronizer<T>,
    pub freshness: Arc<MemoryFreshnessStore>,
    pub entities: Arc<MemoryEntityStore<T>>,
    pub remote: Arc<MockRemote<T>>,
}

impl<T: CacheableEntity> Harness<T> {
    pub fn new(remote_items: Vec<T>) -> Self {
        let freshness = Arc::new(MemoryFreshnessStore::new());
        let entities = Arc::new(MemoryEntityStore::<T>::new());
        let remote = Arc::new(MockRemote::new(remote_items));
        let sync = Synchronizer::new(freshness.clone(), entities.clone(), remote.clone());
        Self {
            sync,
            freshness,
            entities,
            remote,
        }
    }

    /// Cache `item` as if it had been fetched at `at`.
    pub async fn seed(&self, item: &T, at: DateTime<Utc>) {
        self.entities.put(item.entity_id(), item).await.unwrap();
        self.freshness.put(T::kind(), item.entity_id(), at).await.unwrap();
    }
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(minutes)
}

pub fn property(id: &str, owner_id: &str, rent_cents: u64) -> Property {
    Property {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        title: format!("Room {id}"),
        address: "12 Elm St".to_string(),
        rent_cents,
        available_from: None,
        amenities: vec!["wifi".to_string()],
    }
}

pub fn match_for(id: &str, seeker_id: &str) -> Match {
    Match {
        id: id.to_string(),
        seeker_id: seeker_id.to_string(),
        candidate_id: format!("c-{id}"),
        property_id: None,
        score: 0.8,
        matched_at: Utc::now(),
    }
}

pub fn candidate(id: &str) -> Candidate {
    Candidate {
        id: id.to_string(),
        kind: CandidateKind::Roommate,
        display_name: id.to_uppercase(),
        summary: String::new(),
        score: 0.5,
    }
}

pub fn page(prefix: &str, n: usize) -> Vec<Candidate> {
    (0..n).map(|i| candidate(&format!("{prefix}{i}"))).collect()
}

/// Shared log of store writes, in the order they happened.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub struct RecordingFreshness {
    inner: MemoryFreshnessStore,
    log: EventLog,
}

impl RecordingFreshness {
    pub fn new(log: EventLog) -> Self {
        Self {
            inner: MemoryFreshnessStore::new(),
            log,
        }
    }
}

#[async_trait]
impl FreshnessStore for RecordingFreshness {
    async fn put(
        &self,
        kind: EntityKind,
        entity_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.log.lock().unwrap().push(format!("freshness:{entity_id}"));
        self.inner.put(kind, entity_id, timestamp).await
    }

    async fn get(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.inner.get(kind, entity_id).await
    }

    async fn get_all(&self, kind: EntityKind) -> Result<Vec<CacheRecord>, StorageError> {
        self.inner.get_all(kind).await
    }

    async fn delete_one(&self, entity_id: &str) -> Result<(), StorageError> {
        self.log.lock().unwrap().push(format!("delete-freshness:{entity_id}"));
        self.inner.delete_one(entity_id).await
    }

    async fn delete_by_type(&self, kind: EntityKind) -> Result<(), StorageError> {
        self.inner.delete_by_type(kind).await
    }

    async fn delete_all(&self) -> Result<(), StorageError> {
        self.inner.delete_all().await
    }
}

pub struct RecordingEntities<T> {
    inner: MemoryEntityStore<T>,
    log: EventLog,
}

impl<T> RecordingEntities<T> {
    pub fn new(log: EventLog) -> Self {
        Self {
            inner: MemoryEntityStore::new(),
            log,
        }
    }
}

#[async_trait]
impl<T: CacheableEntity> EntityStore<T> for RecordingEntities<T> {
    async fn put(&self, entity_id: &str, payload: &T) -> Result<(), StorageError> {
        self.log.lock().unwrap().push(format!("payload:{entity_id}"));
        self.inner.put(entity_id, payload).await
    }

    async fn get_by_id(&self, entity_id: &str) -> Result<Option<T>, StorageError> {
        self.inner.get_by_id(entity_id).await
    }

    async fn get_all_by_owner(&self, scope_id: &str) -> Result<Vec<T>, StorageError> {
        self.inner.get_all_by_owner(scope_id).await
    }

    async fn delete(&self, entity_id: &str) -> Result<(), StorageError> {
        self.log.lock().unwrap().push(format!("delete-payload:{entity_id}"));
        self.inner.delete(entity_id).await
    }

    async fn delete_all(&self) -> Result<(), StorageError> {
        self.inner.delete_all().await
    }
}

/// Entity store whose every operation fails.
pub struct BrokenEntities;

#[async_trait]
impl<T: CacheableEntity> EntityStore<T> for BrokenEntities {
    async fn put(&self, _entity_id: &str, _payload: &T) -> Result<(), StorageError> {
        Err(broken())
    }

    async fn get_by_id(&self, _entity_id: &str) -> Result<Option<T>, StorageError> {
        Err(broken())
    }

    async fn get_all_by_owner(&self, _scope_id: &str) -> Result<Vec<T>, StorageError> {
        Err(broken())
    }

    async fn delete(&self, _entity_id: &str) -> Result<(), StorageError> {
        Err(broken())
    }

    async fn delete_all(&self) -> Result<(), StorageError> {
        Err(broken())
    }
}

fn broken() -> StorageError {
    StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
}

/// Scripted candidate pages. Once the script runs out every page is empty.
pub struct ScriptedPages {
    pages: Mutex<VecDeque<Result<Vec<Candidate>, String>>>,
    pub fetches: AtomicUsize,
    pub last_limit: AtomicUsize,
    pub decisions: Mutex<Vec<(String, SwipeDecision)>>,
    /// When set, each fetch waits for a permit before answering.
    gate: Option<Arc<Notify>>,
    decision_delay: Duration,
}

impl ScriptedPages {
    pub fn new(pages: Vec<Result<Vec<Candidate>, String>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            fetches: AtomicUsize::new(0),
            last_limit: AtomicUsize::new(0),
            decisions: Mutex::new(Vec::new()),
            gate: None,
            decision_delay: Duration::ZERO,
        }
    }

    /// Make every decision submission take `delay` before it is recorded.
    pub fn with_decision_delay(mut self, delay: Duration) -> Self {
        self.decision_delay = delay;
        self
    }

    pub fn gated(pages: Vec<Result<Vec<Candidate>, String>>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(pages)
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateSource for ScriptedPages {
    async fn fetch_next_page(
        &self,
        _seeker_id: &str,
        limit: usize,
    ) -> Result<Vec<Candidate>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.last_limit.store(limit, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.pages.lock().unwrap().pop_front() {
            Some(Ok(page)) => Ok(page),
            Some(Err(reason)) => Err(RemoteError::Unavailable(reason)),
            None => Ok(Vec::new()),
        }
    }

    async fn submit_decision(
        &self,
        _seeker_id: &str,
        candidate_id: &str,
        decision: SwipeDecision,
    ) -> Result<(), RemoteError> {
        if !self.decision_delay.is_zero() {
            tokio::time::sleep(self.decision_delay).await;
        }
        self.decisions
            .lock()
            .unwrap()
            .push((candidate_id.to_string(), decision));
        Ok(())
    }
}
