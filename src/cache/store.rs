//! Cache entry storage.
//!
//! One entry per [`QueryKey`]. Each entry publishes its [`QueryState`] on a
//! watch channel, so every subscriber observes whole-state transitions and
//! never a half-applied update.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::api::ApiError;
use crate::util::lock::mutex_lock;

use super::data::CachedData;
use super::events::EventKind;
use super::keys::QueryKey;

const SOURCE: &str = "cache::store";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    Uninitialized,
    Loading,
    Success,
    Error,
    /// Holds data that must be refetched before it is served again.
    Stale,
}

impl QueryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryStatus::Uninitialized => "uninitialized",
            QueryStatus::Loading => "loading",
            QueryStatus::Success => "success",
            QueryStatus::Error => "error",
            QueryStatus::Stale => "stale",
        }
    }

    fn needs_fetch(self) -> bool {
        matches!(
            self,
            QueryStatus::Uninitialized | QueryStatus::Error | QueryStatus::Stale
        )
    }
}

#[derive(Debug, Clone)]
pub struct QueryState {
    pub status: QueryStatus,
    pub data: Option<Arc<CachedData>>,
    pub error: Option<ApiError>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
        }
    }
}

impl QueryState {
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }
}

/// Identifies one fetch so a superseded result can be discarded.
pub type FetchTicket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// Cached data is current; nothing to do.
    Fresh,
    /// A fetch for this key is already in flight.
    Join,
    /// The caller must run the fetch and report back with this ticket.
    Start(FetchTicket),
}

struct Entry {
    state: watch::Sender<QueryState>,
    subscribers: usize,
    in_flight: Option<FetchTicket>,
    invalidated_in_flight: bool,
    idle_since: Option<Instant>,
}

impl Entry {
    fn new() -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            state,
            subscribers: 0,
            in_flight: None,
            invalidated_in_flight: false,
            idle_since: Some(Instant::now()),
        }
    }

    fn status(&self) -> QueryStatus {
        self.state.borrow().status
    }

    fn mark_idle_if_unused(&mut self) {
        if self.subscribers == 0 {
            self.idle_since = Some(Instant::now());
        }
    }
}

pub struct CacheStore {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    next_ticket: AtomicU64,
}

impl CacheStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Register interest in `key`, creating the entry if needed.
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<QueryState> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "subscribe");
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.subscribers += 1;
        entry.idle_since = None;
        entry.state.subscribe()
    }

    pub fn unsubscribe(&self, key: &QueryKey) {
        let mut entries = mutex_lock(&self.entries, SOURCE, "unsubscribe");
        if let Some(entry) = entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            entry.mark_idle_if_unused();
        }
    }

    /// Decide whether a network fetch is needed, claiming it if so.
    pub fn begin_fetch(&self, key: &QueryKey) -> FetchPlan {
        let mut entries = mutex_lock(&self.entries, SOURCE, "begin_fetch");
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);

        if entry.in_flight.is_some() {
            return FetchPlan::Join;
        }
        if !entry.status().needs_fetch() {
            return FetchPlan::Fresh;
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        entry.in_flight = Some(ticket);
        entry.invalidated_in_flight = false;
        // Previous data stays visible until the new result lands.
        entry.state.send_modify(|state| state.status = QueryStatus::Loading);
        FetchPlan::Start(ticket)
    }

    /// Record a fetch result. Returns false when the result was discarded
    /// because the entry was reset or evicted meanwhile.
    pub fn finish_fetch(
        &self,
        key: &QueryKey,
        ticket: FetchTicket,
        result: Result<CachedData, ApiError>,
    ) -> bool {
        let mut entries = mutex_lock(&self.entries, SOURCE, "finish_fetch");
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        if entry.in_flight != Some(ticket) {
            debug!(key = %key, ticket, "Discarding superseded fetch result");
            return false;
        }

        entry.in_flight = None;
        let invalidated = std::mem::take(&mut entry.invalidated_in_flight);
        match result {
            Ok(data) => {
                let status = if invalidated {
                    QueryStatus::Stale
                } else {
                    QueryStatus::Success
                };
                entry.state.send_replace(QueryState {
                    status,
                    data: Some(Arc::new(data)),
                    error: None,
                });
            }
            Err(error) => {
                entry.state.send_modify(|state| {
                    state.status = QueryStatus::Error;
                    state.error = Some(error);
                });
            }
        }
        entry.mark_idle_if_unused();
        true
    }

    /// Mark `key` stale. An in-flight fetch lands as stale instead.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let mut entries = mutex_lock(&self.entries, SOURCE, "invalidate");
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };

        if entry.in_flight.is_some() {
            entry.invalidated_in_flight = true;
            return true;
        }
        if entry.status() == QueryStatus::Success {
            entry
                .state
                .send_modify(|state| state.status = QueryStatus::Stale);
            return true;
        }
        false
    }

    /// Apply a patch event to the cached payload of `key`.
    pub fn patch(&self, key: &QueryKey, event: &EventKind) -> bool {
        let entries = mutex_lock(&self.entries, SOURCE, "patch");
        let Some(entry) = entries.get(key) else {
            return false;
        };

        let Some(mut data) = entry.state.borrow().data.as_deref().cloned() else {
            return false;
        };
        if !data.apply(event) {
            return false;
        }

        let data = Arc::new(data);
        entry.state.send_modify(|state| state.data = Some(data));
        true
    }

    /// Forget all data. Subscribed entries survive empty; the rest are dropped.
    /// Results of fetches in flight are discarded when they land.
    pub fn reset(&self) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "reset");
        let before = entries.len();
        entries.retain(|_, entry| entry.subscribers > 0);

        for entry in entries.values_mut() {
            entry.in_flight = None;
            entry.invalidated_in_flight = false;
            entry.state.send_replace(QueryState::default());
        }
        before - entries.len()
    }

    /// Evict entries nobody has used for at least `grace`.
    pub fn collect_garbage(&self, grace: Duration) -> Vec<QueryKey> {
        let now = Instant::now();
        let mut evicted = Vec::new();
        let mut entries = mutex_lock(&self.entries, SOURCE, "collect_garbage");

        entries.retain(|key, entry| {
            let expired = entry.subscribers == 0
                && entry.in_flight.is_none()
                && entry
                    .idle_since
                    .is_some_and(|since| now.duration_since(since) >= grace);
            if expired {
                evicted.push(key.clone());
            }
            !expired
        });
        evicted
    }

    pub fn state(&self, key: &QueryKey) -> Option<QueryState> {
        mutex_lock(&self.entries, SOURCE, "state")
            .get(key)
            .map(|entry| entry.state.borrow().clone())
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        mutex_lock(&self.entries, SOURCE, "subscriber_count")
            .get(key)
            .map_or(0, |entry| entry.subscribers)
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}
