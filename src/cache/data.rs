//! Typed payloads held by cache entries, and the patches they accept.

use finquiz_api_types::{
    CoursePayload, CourseReportsPayload, QuestionPayload, QuestionnairePayload,
    QuestionnaireSummaryPayload, StudentStatsPayload,
};
use serde::Serialize;

use crate::api::{ApiError, ApiResponse};

use super::events::EventKind;
use super::keys::QueryKey;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CachedData {
    Course(CoursePayload),
    CourseReports(CourseReportsPayload),
    Questionnaires(Vec<QuestionnairePayload>),
    Questionnaire(QuestionnairePayload),
    Question(QuestionPayload),
    QuestionnaireSummary(QuestionnaireSummaryPayload),
    StudentStats(StudentStatsPayload),
}

impl CachedData {
    /// Decode a successful response into the shape cached for `key`.
    pub fn decode(key: &QueryKey, response: &ApiResponse) -> Result<Self, ApiError> {
        let fallback = key.fallback_error();
        let data = match key {
            QueryKey::CourseInfo { .. } => {
                let mut course: CoursePayload = response.json(fallback)?;
                normalize_course(&mut course);
                CachedData::Course(course)
            }
            QueryKey::CourseReports { .. } => CachedData::CourseReports(response.json(fallback)?),
            QueryKey::Questionnaires => CachedData::Questionnaires(response.json(fallback)?),
            QueryKey::Questionnaire { .. } => CachedData::Questionnaire(response.json(fallback)?),
            QueryKey::Question { .. } => CachedData::Question(response.json(fallback)?),
            QueryKey::QuestionnaireSummary { .. } => {
                CachedData::QuestionnaireSummary(response.json(fallback)?)
            }
            QueryKey::StudentStats => CachedData::StudentStats(response.json(fallback)?),
        };
        Ok(data)
    }

    /// Apply a patch event in place. Returns whether anything changed.
    pub fn apply(&mut self, event: &EventKind) -> bool {
        match (self, event) {
            (
                CachedData::Questionnaire(questionnaire),
                EventKind::QuestionAnswered {
                    question_id,
                    correct,
                    ..
                },
            ) => {
                match questionnaire
                    .questions
                    .iter_mut()
                    .find(|question| question.id == *question_id)
                {
                    Some(question) if question.correct != Some(*correct) => {
                        question.correct = Some(*correct);
                        true
                    }
                    _ => false,
                }
            }
            (
                CachedData::Questionnaire(questionnaire),
                EventKind::QuestionnaireAdvanced { .. },
            ) => {
                if questionnaire.current_position < questionnaire.questions.len() {
                    questionnaire.current_position += 1;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    pub fn as_questionnaire(&self) -> Option<&QuestionnairePayload> {
        match self {
            CachedData::Questionnaire(questionnaire) => Some(questionnaire),
            _ => None,
        }
    }

    pub fn as_course(&self) -> Option<&CoursePayload> {
        match self {
            CachedData::Course(course) => Some(course),
            _ => None,
        }
    }
}

/// Id of the question a student should see next, if any remain.
pub fn current_question(questionnaire: &QuestionnairePayload) -> Option<u64> {
    questionnaire
        .questions
        .get(questionnaire.current_position)
        .map(|question| question.id)
}

fn normalize_course(course: &mut CoursePayload) {
    for topic in course.units.iter_mut().flat_map(|unit| unit.topics.iter_mut()) {
        topic.notes.get_or_insert_with(String::new);
    }
}
