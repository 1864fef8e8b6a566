//! Consumption plan generation.
//!
//! Merges a batch of cache events into one plan: deduplicated by event id,
//! tags unioned, patches kept in epoch order.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::events::{CacheEvent, EventKind};
use super::keys::Tag;

#[derive(Debug, Default)]
pub struct ConsumptionPlan {
    /// Drop every entry before applying the rest of the plan.
    pub reset: bool,
    pub invalidate_tags: BTreeSet<Tag>,
    /// Patch events in epoch order.
    pub patches: Vec<EventKind>,
}

impl fmt::Display for ConsumptionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConsumptionPlan {{ reset: {}, invalidate: {}, patches: {} }}",
            self.reset,
            self.invalidate_tags.len(),
            self.patches.len(),
        )
    }
}

impl ConsumptionPlan {
    /// A reset discards whatever earlier events in the batch asked for;
    /// events after it still apply.
    pub fn from_events(events: Vec<CacheEvent>) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        let mut events: Vec<_> = events
            .into_iter()
            .filter(|event| seen_ids.insert(event.id))
            .collect();
        events.sort_by_key(|event| event.epoch);

        for event in events {
            match event.kind {
                EventKind::Reset => {
                    plan.reset = true;
                    plan.invalidate_tags.clear();
                    plan.patches.clear();
                }
                EventKind::TagsInvalidated { tags } => plan.invalidate_tags.extend(tags),
                patch @ (EventKind::QuestionAnswered { .. }
                | EventKind::QuestionnaireAdvanced { .. }) => plan.patches.push(patch),
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        !self.reset && self.invalidate_tags.is_empty() && self.patches.is_empty()
    }
}
