//! Cache event system.
//!
//! Mutations never touch another query's entry directly; they publish an
//! event here and the consumer delivers it to whichever entries it targets.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::gauge;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::util::lock::mutex_lock;

use super::keys::{QueryKey, Tag};

const SOURCE: &str = "cache::events";
const METRIC_EVENT_QUEUE_LEN: &str = "finquiz_cache_event_queue_len";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Idempotency key.
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Entries providing any of these tags must be refetched before reuse.
    TagsInvalidated { tags: Vec<Tag> },
    /// An answer was accepted; set `correct` on the matching question.
    QuestionAnswered {
        questionnaire_id: u64,
        question_id: u64,
        correct: bool,
    },
    /// The student moved on to the next question.
    QuestionnaireAdvanced { questionnaire_id: u64 },
    /// Drop everything, e.g. after the actor changed.
    Reset,
}

impl EventKind {
    /// The single entry a patch event is delivered to.
    pub fn patch_target(&self) -> Option<QueryKey> {
        match self {
            EventKind::QuestionAnswered {
                questionnaire_id, ..
            }
            | EventKind::QuestionnaireAdvanced { questionnaire_id } => {
                Some(QueryKey::Questionnaire {
                    id: *questionnaire_id,
                })
            }
            EventKind::TagsInvalidated { .. } | EventKind::Reset => None,
        }
    }
}

/// In-memory FIFO of pending cache events.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) {
        let epoch = self.next_epoch();
        let event = CacheEvent::new(kind, epoch);

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Cache event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        queue.push_back(event);
        gauge!(METRIC_EVENT_QUEUE_LEN).set(queue.len() as f64);
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let events = queue.drain(..count).collect();
        gauge!(METRIC_EVENT_QUEUE_LEN).set(queue.len() as f64);
        events
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
