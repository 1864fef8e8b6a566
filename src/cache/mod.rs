//! Query cache synchronizer.
//!
//! Server resources are cached per [`QueryKey`]. Concurrent reads of one key
//! share a single request. Mutations keep entries consistent either by
//! invalidating [`Tag`]s (the next read refetches) or by publishing a patch
//! event that the targeted entry applies to its own payload.
//!
//! Writes flow through an event queue: a mutation publishes an [`EventKind`],
//! the planner merges pending events into a [`ConsumptionPlan`], and the
//! consumer applies it to the store.

mod client;
mod config;
mod consumer;
mod data;
mod events;
mod keys;
mod planner;
mod registry;
mod store;
mod trigger;

pub use client::{QueryClient, Subscription};
pub use config::CacheConfig;
pub use consumer::CacheConsumer;
pub use data::{CachedData, current_question};
pub use events::{CacheEvent, Epoch, EventKind, EventQueue};
pub use keys::{QueryKey, Tag};
pub use planner::ConsumptionPlan;
pub use registry::CacheRegistry;
pub use store::{CacheStore, FetchPlan, FetchTicket, QueryState, QueryStatus};
pub use trigger::CacheTrigger;
