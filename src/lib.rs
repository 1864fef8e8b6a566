//! FinQuiz client core.
//!
//! A session guard deciding, per navigation, whether a view may render, and a
//! query cache that coalesces reads and keeps entries consistent after writes.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod guard;
pub mod infra;
pub mod session;

mod util;
