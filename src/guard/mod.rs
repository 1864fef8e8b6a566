//! Session guard: route table, per-navigation authorization and the
//! navigator that applies it.

mod decision;
mod navigator;
mod routes;

pub use decision::{ANONYMOUS_ENTRY, GuardDecision, SessionGuard};
pub use navigator::{Location, Navigation, NavigationError, Navigator};
pub use routes::{RouteDescriptor, RouteError, RouteMatch, RouteParams, RouteTable, View};
