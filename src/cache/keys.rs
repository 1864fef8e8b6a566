//! Cache key and tag definitions.
//!
//! A [`QueryKey`] names one cached query (endpoint plus arguments). A [`Tag`]
//! names a server resource; invalidating a tag marks every query providing it
//! stale.

use std::fmt;

use crate::api::ApiRequest;

/// Server resource label used for invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Course(String),
    Questionnaire(u64),
    Question(u64),
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Course(id) => write!(f, "Course:{id}"),
            Tag::Questionnaire(id) => write!(f, "Questionnaire:{id}"),
            Tag::Question(id) => write!(f, "Question:{id}"),
        }
    }
}

/// One cached query: endpoint identity plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKey {
    CourseInfo { course_id: String },
    CourseReports { course_id: String, page: u32 },
    Questionnaires,
    Questionnaire { id: u64 },
    Question { questionnaire_id: u64, question_id: u64 },
    QuestionnaireSummary { id: u64 },
    StudentStats,
}

impl QueryKey {
    pub fn endpoint(&self) -> &'static str {
        match self {
            QueryKey::CourseInfo { .. } => "course_info",
            QueryKey::CourseReports { .. } => "course_reports",
            QueryKey::Questionnaires => "questionnaires",
            QueryKey::Questionnaire { .. } => "questionnaire",
            QueryKey::Question { .. } => "question",
            QueryKey::QuestionnaireSummary { .. } => "questionnaire_summary",
            QueryKey::StudentStats => "student_stats",
        }
    }

    pub fn path(&self) -> String {
        match self {
            QueryKey::CourseInfo { course_id } => format!("api/v1/courses/{course_id}"),
            QueryKey::CourseReports { course_id, page } => {
                format!("api/v1/courses/{course_id}/reports?page={page}")
            }
            QueryKey::Questionnaires => "api/v1/questionnaires".to_string(),
            QueryKey::Questionnaire { id } => format!("api/v1/questionnaires/{id}"),
            QueryKey::Question {
                questionnaire_id,
                question_id,
            } => format!("api/v1/questionnaires/{questionnaire_id}/questions/{question_id}"),
            QueryKey::QuestionnaireSummary { id } => format!("api/v1/questionnaires/{id}/summary"),
            QueryKey::StudentStats => "api/v1/stats".to_string(),
        }
    }

    pub fn request(&self) -> ApiRequest {
        ApiRequest::get(self.path())
    }

    /// Tags this query's data depends on.
    pub fn provides(&self) -> Vec<Tag> {
        match self {
            QueryKey::CourseInfo { course_id } | QueryKey::CourseReports { course_id, .. } => {
                vec![Tag::Course(course_id.clone())]
            }
            QueryKey::Questionnaire { id } | QueryKey::QuestionnaireSummary { id } => {
                vec![Tag::Questionnaire(*id)]
            }
            QueryKey::Question { question_id, .. } => vec![Tag::Question(*question_id)],
            QueryKey::Questionnaires | QueryKey::StudentStats => Vec::new(),
        }
    }

    pub fn fallback_error(&self) -> &'static str {
        match self {
            QueryKey::CourseInfo { .. } => "Error al obtener la información del curso",
            QueryKey::CourseReports { .. } => "Error al obtener los reportes del curso",
            QueryKey::Questionnaires => "Error al obtener los cuestionarios",
            QueryKey::Questionnaire { .. } => "Error al obtener el cuestionario",
            QueryKey::Question { .. } => "Error al obtener la pregunta",
            QueryKey::QuestionnaireSummary { .. } => "Error al obtener el resumen del cuestionario",
            QueryKey::StudentStats => "Error al obtener las estadísticas",
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.endpoint(), self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_render_as_type_and_id() {
        assert_eq!(Tag::Course("3".into()).to_string(), "Course:3");
        assert_eq!(Tag::Questionnaire(8).to_string(), "Questionnaire:8");
        assert_eq!(Tag::Question(21).to_string(), "Question:21");
    }

    #[test]
    fn keys_provide_their_resource_tags() {
        assert_eq!(
            QueryKey::CourseReports {
                course_id: "3".into(),
                page: 2
            }
            .provides(),
            vec![Tag::Course("3".into())]
        );
        assert_eq!(
            QueryKey::QuestionnaireSummary { id: 8 }.provides(),
            vec![Tag::Questionnaire(8)]
        );
        assert_eq!(
            QueryKey::Question {
                questionnaire_id: 8,
                question_id: 21
            }
            .provides(),
            vec![Tag::Question(21)]
        );
        assert!(QueryKey::Questionnaires.provides().is_empty());
    }

    #[test]
    fn identical_arguments_are_the_same_key() {
        let a = QueryKey::Question {
            questionnaire_id: 1,
            question_id: 2,
        };
        let b = QueryKey::Question {
            questionnaire_id: 1,
            question_id: 2,
        };
        let c = QueryKey::Question {
            questionnaire_id: 2,
            question_id: 1,
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.path(), "api/v1/questionnaires/1/questions/2");
    }
}
