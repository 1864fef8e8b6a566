//! Navigation through the session guard.
//!
//! Every path is resolved against the route table and evaluated for the
//! current session; redirects are followed until a view renders.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::session::{SessionProvider, now_unix};

use super::decision::{GuardDecision, SessionGuard};
use super::routes::{RouteMatch, RouteParams, RouteTable, View};

/// Redirect hops followed before a navigation is abandoned.
const MAX_REDIRECTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub path: String,
    pub view: View,
    pub params: RouteParams,
    pub uses_layout: bool,
}

impl Location {
    fn from_match(path: &str, matched: RouteMatch<'_>) -> Self {
        Self {
            path: path.to_string(),
            view: matched.route.view,
            params: matched.params,
            uses_layout: matched.route.uses_layout,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub requested: String,
    pub location: Location,
    /// Every redirect target followed, in order.
    pub redirects: Vec<String>,
}

impl Navigation {
    pub fn redirected(&self) -> bool {
        !self.redirects.is_empty()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("no route matches `{path}`")]
    NoRoute { path: String },
    #[error("navigation to `{path}` exceeded {hops} redirects")]
    RedirectLoop { path: String, hops: usize },
}

/// Resolves paths, runs the guard on every navigation and publishes the
/// current location.
pub struct Navigator {
    table: RouteTable,
    guard: SessionGuard,
    session: Arc<SessionProvider>,
    current: watch::Sender<Option<Location>>,
}

impl Navigator {
    pub fn new(table: RouteTable, guard: SessionGuard, session: Arc<SessionProvider>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            table,
            guard,
            session,
            current,
        }
    }

    pub fn navigate(&self, path: &str) -> Result<Navigation, NavigationError> {
        self.navigate_at(path, now_unix())
    }

    /// Navigate with the clock pinned to `now` (unix seconds).
    pub fn navigate_at(&self, path: &str, now: i64) -> Result<Navigation, NavigationError> {
        let session = self.session.get();
        let mut target = path.to_string();
        let mut redirects = Vec::new();

        loop {
            let matched = self
                .table
                .resolve(&target)
                .ok_or_else(|| NavigationError::NoRoute {
                    path: target.clone(),
                })?;

            match self.guard.evaluate(matched.route, &session, now) {
                GuardDecision::Render => {
                    let location = Location::from_match(&target, matched);
                    self.current.send_replace(Some(location.clone()));
                    if !redirects.is_empty() {
                        info!(
                            target = "finquiz::guard",
                            requested = path,
                            landed = %location.path,
                            hops = redirects.len(),
                            "Navigation redirected"
                        );
                    }
                    return Ok(Navigation {
                        requested: path.to_string(),
                        location,
                        redirects,
                    });
                }
                GuardDecision::Redirect(next) => {
                    if redirects.len() == MAX_REDIRECTS {
                        return Err(NavigationError::RedirectLoop {
                            path: path.to_string(),
                            hops: MAX_REDIRECTS,
                        });
                    }
                    debug!(
                        target = "finquiz::guard",
                        from = %target,
                        pattern = matched.route.pattern(),
                        to = %next,
                        "Guard redirect"
                    );
                    redirects.push(next.clone());
                    target = next;
                }
            }
        }
    }

    /// Move to `path` without consulting the guard.
    pub fn force(&self, path: &str) -> Result<Location, NavigationError> {
        let matched = self
            .table
            .resolve(path)
            .ok_or_else(|| NavigationError::NoRoute {
                path: path.to_string(),
            })?;
        let location = Location::from_match(path, matched);
        self.current.send_replace(Some(location.clone()));
        Ok(location)
    }

    pub fn current(&self) -> Option<Location> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Location>> {
        self.current.subscribe()
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }
}
