//! Cache trigger service.
//!
//! The publishing side of the cache: mutations describe what happened and
//! the consumer applies it before the trigger returns.

use std::sync::Arc;

use tracing::debug;

use super::consumer::CacheConsumer;
use super::events::{EventKind, EventQueue};
use super::keys::Tag;

pub struct CacheTrigger {
    queue: Arc<EventQueue>,
    consumer: Arc<CacheConsumer>,
}

impl CacheTrigger {
    pub fn new(queue: Arc<EventQueue>, consumer: Arc<CacheConsumer>) -> Self {
        Self { queue, consumer }
    }

    /// Publish an event and consume the queue.
    pub fn trigger(&self, kind: EventKind) {
        self.queue.publish(kind);
        if !self.consumer.consume() {
            debug!("Cache trigger found nothing to consume");
        }
    }

    pub fn tags_invalidated(&self, tags: Vec<Tag>) {
        if tags.is_empty() {
            return;
        }
        self.trigger(EventKind::TagsInvalidated { tags });
    }

    pub fn questionnaire_advanced(&self, questionnaire_id: u64) {
        self.trigger(EventKind::QuestionnaireAdvanced { questionnaire_id });
    }

    pub fn reset(&self) {
        self.trigger(EventKind::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::registry::CacheRegistry;
    use crate::cache::store::CacheStore;

    fn trigger() -> (CacheTrigger, Arc<EventQueue>) {
        let queue = Arc::new(EventQueue::new());
        let consumer = Arc::new(CacheConsumer::new(
            CacheConfig::default(),
            Arc::new(CacheStore::new()),
            Arc::new(CacheRegistry::new()),
            queue.clone(),
        ));
        (CacheTrigger::new(queue.clone(), consumer), queue)
    }

    #[test]
    fn triggers_consume_immediately() {
        let (trigger, queue) = trigger();
        trigger.trigger(EventKind::QuestionAnswered {
            questionnaire_id: 1,
            question_id: 2,
            correct: true,
        });
        trigger.questionnaire_advanced(1);
        trigger.reset();
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_invalidation_publishes_nothing() {
        let (trigger, queue) = trigger();
        trigger.tags_invalidated(Vec::new());
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }
}
