//! Session value types and the expiry policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Role carried by an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Student, Role::Teacher];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub role: Option<Role>,
    pub selected_course_id: Option<String>,
}

/// The authenticated (or anonymous) actor of this client process.
///
/// `Session::default()` is the anonymous session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub client: Option<String>,
    pub uid: Option<String>,
    pub expiry: Option<String>,
    pub user: UserProfile,
}

impl Session {
    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Token present and not expired at `now` (unix seconds).
    pub fn is_authenticated_at(&self, now: i64) -> bool {
        self.has_token() && !is_expired_at(self.expiry.as_deref(), now)
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(now_unix())
    }

    pub fn role(&self) -> Option<Role> {
        self.user.role
    }

    /// Token, client id and uid, only when all three are present.
    pub fn credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.access_token, &self.client, &self.uid) {
            (Some(token), Some(client), Some(uid)) => Some((token, client, uid)),
            _ => None,
        }
    }
}

/// Current wall-clock time in unix seconds.
pub fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

pub fn is_expired(expiry: Option<&str>) -> bool {
    is_expired_at(expiry, now_unix())
}

/// Expiry check that fails closed: an absent or unparseable expiry counts as
/// expired, as does any expiry at or before `now`.
pub fn is_expired_at(expiry: Option<&str>, now: i64) -> bool {
    let Some(raw) = expiry.map(str::trim).filter(|value| !value.is_empty()) else {
        return true;
    };

    match raw.parse::<i64>() {
        Ok(expires_at) => expires_at <= now,
        Err(_) => true,
    }
}
