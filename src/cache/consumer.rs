//! Cache consumer for executing consumption plans.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::EventQueue;
use super::planner::ConsumptionPlan;
use super::registry::CacheRegistry;
use super::store::CacheStore;

const METRIC_CACHE_CONSUME_MS: &str = "finquiz_cache_consume_ms";
const METRIC_CACHE_INVALIDATED: &str = "finquiz_cache_invalidated_total";
const METRIC_CACHE_PATCHED: &str = "finquiz_cache_patched_total";

/// Drains the event queue and applies each plan to the store:
/// reset first, then tag invalidation, then patches in epoch order.
pub struct CacheConsumer {
    config: CacheConfig,
    store: Arc<CacheStore>,
    registry: Arc<CacheRegistry>,
    queue: Arc<EventQueue>,
}

impl CacheConsumer {
    pub fn new(
        config: CacheConfig,
        store: Arc<CacheStore>,
        registry: Arc<CacheRegistry>,
        queue: Arc<EventQueue>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            queue,
        }
    }

    /// Consume pending events until the queue is empty.
    ///
    /// Returns true if any events were processed.
    #[instrument(skip(self))]
    pub fn consume(&self) -> bool {
        let mut processed = false;
        while self.consume_batch() {
            processed = true;
        }
        processed
    }

    fn consume_batch(&self) -> bool {
        let started_at = Instant::now();
        let events = self.queue.drain(self.config.consume_batch_limit);
        if events.is_empty() {
            return false;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|event| event.id).collect();
        let plan = ConsumptionPlan::from_events(events);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache consumption starting"
        );

        if plan.reset {
            let dropped = self.store.reset();
            self.registry.clear();
            debug!(dropped, "Cache reset");
        }

        let invalidated = self.invalidate(&plan);
        let patched = self.patch(&plan);

        info!(event_count, invalidated, patched, "Cache consumption complete");
        histogram!(METRIC_CACHE_CONSUME_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        true
    }

    fn invalidate(&self, plan: &ConsumptionPlan) -> usize {
        let mut invalidated = 0;
        for tag in &plan.invalidate_tags {
            for key in self.registry.keys_for_tag(tag) {
                if self.store.invalidate(&key) {
                    debug!(tag = %tag, key = %key, "Cache entry invalidated");
                    invalidated += 1;
                }
            }
        }
        counter!(METRIC_CACHE_INVALIDATED).increment(invalidated as u64);
        invalidated
    }

    fn patch(&self, plan: &ConsumptionPlan) -> usize {
        let mut patched = 0;
        for event in &plan.patches {
            let Some(target) = event.patch_target() else {
                continue;
            };
            if self.store.patch(&target, event) {
                debug!(key = %target, event = ?event, "Cache entry patched");
                patched += 1;
            }
        }
        counter!(METRIC_CACHE_PATCHED).increment(patched as u64);
        patched
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use finquiz_api_types::{CoursePayload, QuestionRef, QuestionnairePayload};

    use super::*;
    use crate::cache::data::CachedData;
    use crate::cache::events::EventKind;
    use crate::cache::keys::{QueryKey, Tag};
    use crate::cache::store::{FetchPlan, QueryStatus};

    struct Harness {
        store: Arc<CacheStore>,
        registry: Arc<CacheRegistry>,
        queue: Arc<EventQueue>,
        consumer: CacheConsumer,
    }

    fn harness(batch_limit: usize) -> Harness {
        let store = Arc::new(CacheStore::new());
        let registry = Arc::new(CacheRegistry::new());
        let queue = Arc::new(EventQueue::new());
        let config = CacheConfig {
            consume_batch_limit: batch_limit,
            ..CacheConfig::default()
        };
        let consumer = CacheConsumer::new(config, store.clone(), registry.clone(), queue.clone());
        Harness {
            store,
            registry,
            queue,
            consumer,
        }
    }

    fn load(h: &Harness, key: QueryKey, data: CachedData) {
        let FetchPlan::Start(ticket) = h.store.begin_fetch(&key) else {
            panic!("expected a fetch to start");
        };
        h.registry
            .register(key.clone(), key.provides().into_iter().collect::<HashSet<_>>());
        h.store.finish_fetch(&key, ticket, Ok(data));
    }

    fn course_key() -> QueryKey {
        QueryKey::CourseInfo {
            course_id: "1".into(),
        }
    }

    fn questionnaire_key() -> QueryKey {
        QueryKey::Questionnaire { id: 4 }
    }

    fn seeded(batch_limit: usize) -> Harness {
        let h = harness(batch_limit);
        load(&h, course_key(), CachedData::Course(CoursePayload::default()));
        load(
            &h,
            questionnaire_key(),
            CachedData::Questionnaire(QuestionnairePayload {
                id: 4,
                questions: vec![QuestionRef { id: 8, correct: None }],
                ..Default::default()
            }),
        );
        h
    }

    #[test]
    fn empty_queue_is_a_no_op() {
        let h = harness(10);
        assert!(!h.consumer.consume());
    }

    #[test]
    fn invalidation_reaches_entries_through_tags() {
        let h = seeded(10);
        h.queue.publish(EventKind::TagsInvalidated {
            tags: vec![Tag::Course("1".into())],
        });

        assert!(h.consumer.consume());
        assert_eq!(
            h.store.state(&course_key()).expect("course").status,
            QueryStatus::Stale
        );
        assert_eq!(
            h.store.state(&questionnaire_key()).expect("questionnaire").status,
            QueryStatus::Success
        );
    }

    #[test]
    fn patch_reaches_its_target_only() {
        let h = seeded(10);
        h.queue.publish(EventKind::QuestionAnswered {
            questionnaire_id: 4,
            question_id: 8,
            correct: true,
        });

        h.consumer.consume();
        let state = h.store.state(&questionnaire_key()).expect("questionnaire");
        assert_eq!(state.status, QueryStatus::Success);
        let questions = &state
            .data
            .as_deref()
            .and_then(CachedData::as_questionnaire)
            .expect("payload")
            .questions;
        assert_eq!(questions[0].correct, Some(true));
    }

    #[test]
    fn reset_clears_store_and_registry() {
        let h = seeded(10);
        h.queue.publish(EventKind::Reset);

        h.consumer.consume();
        assert!(h.store.is_empty());
        assert_eq!(h.registry.key_count(), 0);
    }

    #[test]
    fn drains_across_batches() {
        let h = seeded(1);
        h.queue.publish(EventKind::QuestionnaireAdvanced { questionnaire_id: 4 });
        h.queue.publish(EventKind::TagsInvalidated {
            tags: vec![Tag::Questionnaire(4)],
        });

        assert!(h.consumer.consume());
        assert!(h.queue.is_empty());

        let state = h.store.state(&questionnaire_key()).expect("questionnaire");
        assert_eq!(state.status, QueryStatus::Stale);
        assert_eq!(
            state
                .data
                .as_deref()
                .and_then(CachedData::as_questionnaire)
                .expect("payload")
                .current_position,
            1
        );
    }
}
