//! Per-navigation authorization decision.

use serde::Serialize;

use crate::session::Session;

use super::routes::RouteDescriptor;

/// Where anonymous actors land.
pub const ANONYMOUS_ENTRY: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "to", rename_all = "snake_case")]
pub enum GuardDecision {
    Render,
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct SessionGuard {
    default_course_id: String,
}

impl SessionGuard {
    pub fn new(default_course_id: impl Into<String>) -> Self {
        Self {
            default_course_id: default_course_id.into(),
        }
    }

    /// Course page of the session's selected course.
    pub fn home_path(&self, session: &Session) -> String {
        let course_id = session
            .user
            .selected_course_id
            .as_deref()
            .unwrap_or(&self.default_course_id);
        format!("/courses/{course_id}")
    }

    /// Decide whether `route` may render for `session` at `now` (unix seconds).
    pub fn evaluate(&self, route: &RouteDescriptor, session: &Session, now: i64) -> GuardDecision {
        let authenticated = session.is_authenticated_at(now);
        let authorized = route.allows(session.role());

        match (authenticated, route.need_auth, authorized) {
            (false, true, _) => GuardDecision::Redirect(ANONYMOUS_ENTRY.to_string()),
            (false, false, _) => GuardDecision::Render,
            (true, false, _) | (true, true, false) => {
                GuardDecision::Redirect(self.home_path(session))
            }
            (true, true, true) => GuardDecision::Render,
        }
    }
}
