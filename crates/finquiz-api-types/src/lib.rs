//! Request and response shapes of the FinQuiz REST API.
//!
//! Resource bodies arrive wrapped as `{ "data": ... }`; some endpoints answer
//! with the bare resource instead, so decoding goes through [`Payload`].
//! Error bodies carry an `errors` string list, either at the top level or
//! nested under `data`.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};

/// Resource body, enveloped or bare.
///
/// A body with a top-level `data` key is always read as an envelope, so a
/// malformed resource fails to decode instead of matching the bare shape.
#[derive(Debug, Clone)]
pub enum Payload<T> {
    Enveloped { data: T },
    Bare(T),
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Payload<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut body = serde_json::Value::deserialize(deserializer)?;
        let data = body.as_object_mut().and_then(|object| object.remove("data"));
        let payload = match data {
            Some(data) => serde_json::from_value(data).map(|data| Self::Enveloped { data }),
            None => serde_json::from_value(body).map(Self::Bare),
        };
        payload.map_err(de::Error::custom)
    }
}

impl<T> Payload<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Enveloped { data } => data,
            Self::Bare(data) => data,
        }
    }
}

/// Body of a failed request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub errors: Option<Vec<String>>,
    pub data: Option<NestedErrors>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NestedErrors {
    pub errors: Option<Vec<String>>,
}

impl ErrorBody {
    /// Error messages, preferring the top-level list.
    pub fn messages(self) -> Vec<String> {
        self.errors
            .filter(|errors| !errors.is_empty())
            .or_else(|| self.data.and_then(|nested| nested.errors))
            .unwrap_or_default()
    }
}

// ============================================================================
// Authentication
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// User profile returned by a successful sign in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserPayload {
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub selected_course_id: Option<String>,
}

// ============================================================================
// Courses
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoursePayload {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub units: Vec<UnitPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UnitPayload {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub position: i64,
    pub topics: Vec<TopicPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopicPayload {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "shortDescription", alias = "short_description")]
    pub short_description: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Teacher report for one course page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CourseReportsPayload {
    pub course: CourseSummary,
    #[serde(rename = "generalStats", alias = "general_stats")]
    pub general_stats: serde_json::Value,
    #[serde(rename = "studentsStats", alias = "students_stats")]
    pub students_stats: Vec<serde_json::Value>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CourseSummary {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
    pub count: u64,
}

// ============================================================================
// Questionnaires
// ============================================================================

/// Question reference inside a questionnaire, carrying the answer outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuestionRef {
    pub id: u64,
    pub correct: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuestionnairePayload {
    pub id: u64,
    pub name: String,
    pub questions: Vec<QuestionRef>,
    #[serde(rename = "currentPosition", alias = "current_position")]
    pub current_position: usize,
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: Option<String>,
    pub result: Option<f64>,
    pub units: Vec<UnitRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UnitRef {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub position: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuestionOption {
    pub id: u64,
    pub text: String,
}

/// Full question as served for answering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuestionPayload {
    pub id: u64,
    pub correct: Option<bool>,
    pub title: String,
    pub stem: String,
    pub options: Vec<QuestionOption>,
    pub generating: bool,
    pub score: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerRequest {
    pub answer: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnswerResponse {
    pub id: u64,
    pub correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VoteAction {
    UpVote,
    Report,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRequest {
    pub action: VoteAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StudentStatsPayload {
    #[serde(rename = "questionnairesCount", alias = "questionnaires_count")]
    pub questionnaires_count: u64,
    #[serde(rename = "successTopics", alias = "success_topics")]
    pub success_topics: Vec<TopicRef>,
    #[serde(rename = "failureTopics", alias = "failure_topics")]
    pub failure_topics: Vec<TopicRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TopicRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuestionnaireSummaryPayload {
    pub id: u64,
    pub name: String,
    pub questions: Vec<QuestionPayload>,
    pub stats: SummaryStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummaryStats {
    pub total: f64,
    pub stats_by_topic: Vec<TopicResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopicResult {
    pub topic_name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Integer(i64),
    Float(f64),
}

/// Accept identifiers sent either as JSON strings or numbers.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
            StringOrNumber::Text(text) => text,
            StringOrNumber::Integer(number) => number.to_string(),
            StringOrNumber::Float(number) => number.to_string(),
        }),
    )
}
