//! Query and mutation surface of the cache.
//!
//! Callers never touch entries directly: reads go through [`QueryClient::query`]
//! or a [`Subscription`], writes through [`QueryClient::mutate`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{ApiError, Mutation, MutationOutcome, Settled, Transport, UpdateStrategy};
use crate::session::SessionProvider;

use super::config::CacheConfig;
use super::consumer::CacheConsumer;
use super::data::CachedData;
use super::events::EventQueue;
use super::keys::{QueryKey, Tag};
use super::registry::CacheRegistry;
use super::store::{CacheStore, FetchPlan, FetchTicket, QueryState, QueryStatus};
use super::trigger::CacheTrigger;

const METRIC_QUERY_HIT: &str = "finquiz_cache_hit_total";
const METRIC_QUERY_MISS: &str = "finquiz_cache_miss_total";
const METRIC_QUERY_COALESCED: &str = "finquiz_cache_coalesced_total";
const METRIC_FETCH_MS: &str = "finquiz_cache_fetch_ms";
const METRIC_EVICT: &str = "finquiz_cache_evict_total";
const METRIC_MUTATION: &str = "finquiz_mutation_total";

#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: CacheConfig,
    store: Arc<CacheStore>,
    registry: Arc<CacheRegistry>,
    trigger: CacheTrigger,
    transport: Arc<dyn Transport>,
    session: Arc<SessionProvider>,
}

impl QueryClient {
    pub fn new(
        config: CacheConfig,
        transport: Arc<dyn Transport>,
        session: Arc<SessionProvider>,
    ) -> Self {
        let store = Arc::new(CacheStore::new());
        let registry = Arc::new(CacheRegistry::new());
        let queue = Arc::new(EventQueue::new());
        let consumer = Arc::new(CacheConsumer::new(
            config.clone(),
            store.clone(),
            registry.clone(),
            queue.clone(),
        ));
        let trigger = CacheTrigger::new(queue, consumer);

        Self {
            inner: Arc::new(Inner {
                config,
                store,
                registry,
                trigger,
                transport,
                session,
            }),
        }
    }

    /// Subscribe to `key` and wait for a settled state.
    ///
    /// Concurrent calls for the same key share one network request.
    pub async fn query(&self, key: QueryKey) -> QueryState {
        let mut subscription = self.subscribe(key);
        subscription.load().await
    }

    /// Hold interest in `key` without loading it; dropping the handle releases it.
    pub fn subscribe(&self, key: QueryKey) -> Subscription {
        let receiver = self.inner.store.subscribe(&key);
        Subscription {
            client: self.clone(),
            key,
            receiver,
        }
    }

    /// Run exactly one write and apply its cache update before returning.
    pub async fn mutate(&self, mutation: Mutation) -> Result<MutationOutcome, ApiError> {
        let name = mutation.name();
        let fallback = mutation.fallback_error();
        let request = mutation.request()?;

        let response = match self.inner.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(mutation = name, error = %err, "Mutation transport failed");
                counter!(METRIC_MUTATION, "mutation" => name, "result" => "transport_error")
                    .increment(1);
                return Err(ApiError::transport(fallback));
            }
        };

        let settled = response
            .error_for_status(fallback)
            .and_then(|response| mutation.settle(&response));
        let Settled { outcome, strategy } = match settled {
            Ok(settled) => settled,
            Err(error) => {
                info!(mutation = name, status = error.status, error = %error, "Mutation rejected");
                counter!(METRIC_MUTATION, "mutation" => name, "result" => "error").increment(1);
                return Err(error);
            }
        };

        self.apply_session(&outcome);
        self.apply_strategy(strategy);

        counter!(METRIC_MUTATION, "mutation" => name, "result" => "ok").increment(1);
        info!(mutation = name, "Mutation applied");
        Ok(outcome)
    }

    /// Local-only step to the next question of a cached questionnaire.
    pub fn advance_questionnaire(&self, questionnaire_id: u64) {
        self.inner.trigger.questionnaire_advanced(questionnaire_id);
    }

    pub fn invalidate(&self, tags: Vec<Tag>) {
        self.inner.trigger.tags_invalidated(tags);
    }

    pub fn reset(&self) {
        self.inner.trigger.reset();
    }

    pub fn state(&self, key: &QueryKey) -> Option<QueryState> {
        self.inner.store.state(key)
    }

    pub fn entry_count(&self) -> usize {
        self.inner.store.len()
    }

    /// Evict entries unused for longer than the configured grace period.
    pub fn collect_garbage(&self) -> usize {
        let evicted = self.inner.store.collect_garbage(self.inner.config.gc_grace);
        for key in &evicted {
            self.inner.registry.unregister(key);
            debug!(key = %key, "Cache entry evicted");
        }
        counter!(METRIC_EVICT).increment(evicted.len() as u64);
        evicted.len()
    }

    /// Run [`collect_garbage`](Self::collect_garbage) every `gc_interval`.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(client.inner.config.gc_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                client.collect_garbage();
            }
        })
    }

    fn ensure_fresh(&self, key: &QueryKey) {
        match self.inner.store.begin_fetch(key) {
            FetchPlan::Fresh => {
                counter!(METRIC_QUERY_HIT, "endpoint" => key.endpoint()).increment(1);
            }
            FetchPlan::Join => {
                counter!(METRIC_QUERY_COALESCED, "endpoint" => key.endpoint()).increment(1);
                debug!(key = %key, "Joined in-flight fetch");
            }
            FetchPlan::Start(ticket) => {
                counter!(METRIC_QUERY_MISS, "endpoint" => key.endpoint()).increment(1);
                let tags: HashSet<Tag> = key.provides().into_iter().collect();
                self.inner.registry.register(key.clone(), tags);

                // Detached so a caller going away never cancels the fetch.
                let inner = self.inner.clone();
                let key = key.clone();
                tokio::spawn(async move { inner.fetch(key, ticket).await });
            }
        }
    }

    fn apply_session(&self, outcome: &MutationOutcome) {
        let result = match outcome {
            MutationOutcome::SignedIn { session } => self.inner.session.set(session.clone()),
            MutationOutcome::SignedOut => self.inner.session.clear(),
            _ => return,
        };
        if let Err(err) = result {
            warn!(error = %err, "Failed to persist session change");
        }
    }

    fn apply_strategy(&self, strategy: UpdateStrategy) {
        match strategy {
            UpdateStrategy::None => {}
            UpdateStrategy::Invalidate(tags) => self.inner.trigger.tags_invalidated(tags),
            UpdateStrategy::Patch(event) => self.inner.trigger.trigger(event),
            UpdateStrategy::Reset => self.inner.trigger.reset(),
        }
    }
}

impl Inner {
    async fn fetch(&self, key: QueryKey, ticket: FetchTicket) {
        let started_at = Instant::now();
        let fallback = key.fallback_error();

        let result = match self.transport.send(key.request()).await {
            Ok(response) => response
                .error_for_status(fallback)
                .and_then(|response| CachedData::decode(&key, &response)),
            Err(err) => {
                warn!(key = %key, error = %err, "Query transport failed");
                Err(ApiError::transport(fallback))
            }
        };

        histogram!(METRIC_FETCH_MS, "endpoint" => key.endpoint())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        match &result {
            Ok(_) => debug!(key = %key, "Query fetched"),
            Err(error) => info!(key = %key, status = error.status, error = %error, "Query failed"),
        }

        if !self.store.finish_fetch(&key, ticket, result) {
            debug!(key = %key, "Fetch result dropped");
        }
    }
}

/// Live interest in one cache entry.
pub struct Subscription {
    client: QueryClient,
    key: QueryKey,
    receiver: watch::Receiver<QueryState>,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn current(&self) -> QueryState {
        self.receiver.borrow().clone()
    }

    /// Fetch if needed and wait until the entry settles.
    pub async fn load(&mut self) -> QueryState {
        loop {
            self.client.ensure_fresh(&self.key);
            let settled = self
                .receiver
                .wait_for(|state| state.status != QueryStatus::Loading)
                .await
                .map(|state| state.clone());

            match settled {
                // Reset or invalidated while we waited; never hand out stale data.
                Ok(state)
                    if matches!(
                        state.status,
                        QueryStatus::Uninitialized | QueryStatus::Stale
                    ) =>
                {
                    continue;
                }
                Ok(state) => return state,
                Err(_) => return self.current(),
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.client.inner.store.unsubscribe(&self.key);
    }
}
