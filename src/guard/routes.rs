//! Static route table.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::session::Role;

/// Parameters captured from a matched path, by name. A catch-all capture is
/// stored under `*`.
pub type RouteParams = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Login,
    Course,
    Reports,
    MyQuestionnaires,
    Questionnaire,
    QuestionnaireSummary,
    NotFound,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route `{pattern}` declares no allowed roles")]
    NoRoles { pattern: String },
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    CatchAll,
}

#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pattern: String,
    segments: Vec<Segment>,
    pub need_auth: bool,
    /// Never empty, including for anonymous routes where it goes unused.
    pub allowed_roles: BTreeSet<Role>,
    pub view: View,
    pub uses_layout: bool,
}

impl RouteDescriptor {
    pub fn new(
        pattern: &str,
        need_auth: bool,
        allowed_roles: impl IntoIterator<Item = Role>,
        view: View,
        uses_layout: bool,
    ) -> Result<Self, RouteError> {
        let allowed_roles: BTreeSet<Role> = allowed_roles.into_iter().collect();
        if allowed_roles.is_empty() {
            return Err(RouteError::NoRoles {
                pattern: pattern.to_string(),
            });
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments: parse_pattern(pattern)?,
            need_auth,
            allowed_roles,
            view,
            uses_layout,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn allows(&self, role: Option<Role>) -> bool {
        role.is_some_and(|role| self.allowed_roles.contains(&role))
    }

    fn matches(&self, path: &[&str]) -> Option<RouteParams> {
        let mut params = RouteParams::new();
        let mut rest = path;

        for segment in &self.segments {
            match segment {
                Segment::CatchAll => {
                    params.insert("*".to_string(), rest.join("/"));
                    return Some(params);
                }
                Segment::Literal(literal) => {
                    let (head, tail) = rest.split_first()?;
                    if head != literal {
                        return None;
                    }
                    rest = tail;
                }
                Segment::Param(name) => {
                    let (head, tail) = rest.split_first()?;
                    params.insert(name.clone(), (*head).to_string());
                    rest = tail;
                }
            }
        }

        rest.is_empty().then_some(params)
    }
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, RouteError> {
    let invalid = |reason| RouteError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    if pattern == "*" {
        return Ok(vec![Segment::CatchAll]);
    }
    if !pattern.starts_with('/') {
        return Err(invalid("must start with `/` or be `*`"));
    }

    let raw: Vec<&str> = split_path(pattern);
    let mut segments = Vec::with_capacity(raw.len());
    for (index, part) in raw.iter().enumerate() {
        let segment = if *part == "*" {
            if index + 1 != raw.len() {
                return Err(invalid("`*` must be the last segment"));
            }
            Segment::CatchAll
        } else if let Some(name) = part.strip_prefix(':') {
            if name.is_empty() {
                return Err(invalid("parameter name is empty"));
            }
            Segment::Param(name.to_string())
        } else {
            Segment::Literal((*part).to_string())
        };
        segments.push(segment);
    }
    Ok(segments)
}

/// Path segments with any query string or fragment removed.
fn split_path(path: &str) -> Vec<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a RouteDescriptor,
    pub params: RouteParams,
}

/// Ordered routes; the first match wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteDescriptor>) -> Self {
        Self { routes }
    }

    /// The FinQuiz application routes.
    pub fn finquiz() -> Result<Self, RouteError> {
        use Role::{Student, Teacher};

        Ok(Self::new(vec![
            RouteDescriptor::new("/", false, [Student, Teacher], View::Login, false)?,
            RouteDescriptor::new("/courses/:id", true, [Student, Teacher], View::Course, true)?,
            RouteDescriptor::new(
                "/courses/:courseId/reports",
                true,
                [Teacher],
                View::Reports,
                true,
            )?,
            RouteDescriptor::new(
                "/questionnaires",
                true,
                [Student],
                View::MyQuestionnaires,
                true,
            )?,
            RouteDescriptor::new(
                "/questionnaires/:id",
                true,
                [Student],
                View::Questionnaire,
                true,
            )?,
            RouteDescriptor::new(
                "/questionnaires/:id/summary",
                true,
                [Student],
                View::QuestionnaireSummary,
                true,
            )?,
            RouteDescriptor::new("*", true, [Student, Teacher], View::NotFound, false)?,
        ]))
    }

    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_>> {
        let segments = split_path(path);
        self.routes.iter().find_map(|route| {
            route
                .matches(&segments)
                .map(|params| RouteMatch { route, params })
        })
    }
}
