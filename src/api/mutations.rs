//! Write operations and how each one keeps the query cache consistent.

use finquiz_api_types::{
    AnswerRequest, AnswerResponse, CourseBody, SignInRequest, TopicBody, UnitBody, UserPayload,
    VoteAction, VoteRequest,
};
use serde::Serialize;

use crate::cache::{EventKind, Tag};
use crate::session::{Role, Session, UserProfile};

use super::error::ApiError;
use super::transport::{ApiRequest, ApiResponse, HttpMethod};

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Login {
        email: String,
        password: String,
    },
    Logout,
    UpdateCourse {
        course_id: String,
        body: CourseBody,
    },
    CreateUnit {
        course_id: String,
        body: UnitBody,
    },
    UpdateUnit {
        course_id: String,
        unit_id: u64,
        body: UnitBody,
    },
    DeleteUnit {
        course_id: String,
        unit_id: u64,
    },
    CreateTopic {
        course_id: String,
        unit_id: u64,
        body: TopicBody,
    },
    UpdateTopic {
        course_id: String,
        unit_id: u64,
        topic_id: u64,
        body: TopicBody,
    },
    DeleteTopic {
        course_id: String,
        unit_id: u64,
        topic_id: u64,
    },
    AnswerQuestion {
        questionnaire_id: u64,
        question_id: u64,
        answer: u64,
    },
    VoteQuestion {
        questionnaire_id: u64,
        question_id: u64,
        action: VoteAction,
    },
}

/// How a successful mutation updates cached queries.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateStrategy {
    None,
    /// Mark every entry providing one of these tags stale.
    Invalidate(Vec<Tag>),
    /// Deliver an event to the entry it targets; no refetch.
    Patch(EventKind),
    /// Drop every entry; the actor changed.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MutationOutcome {
    SignedIn { session: Session },
    SignedOut,
    Answered { answer: AnswerResponse },
    Voted { action: VoteAction },
    Applied,
}

/// Result of interpreting a successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    pub outcome: MutationOutcome,
    pub strategy: UpdateStrategy,
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Login { .. } => "login",
            Mutation::Logout => "logout",
            Mutation::UpdateCourse { .. } => "update_course",
            Mutation::CreateUnit { .. } => "create_unit",
            Mutation::UpdateUnit { .. } => "update_unit",
            Mutation::DeleteUnit { .. } => "delete_unit",
            Mutation::CreateTopic { .. } => "create_topic",
            Mutation::UpdateTopic { .. } => "update_topic",
            Mutation::DeleteTopic { .. } => "delete_topic",
            Mutation::AnswerQuestion { .. } => "answer_question",
            Mutation::VoteQuestion { .. } => "vote_question",
        }
    }

    /// Message shown when the server gives no usable error list.
    pub fn fallback_error(&self) -> &'static str {
        match self {
            Mutation::Login { .. } => "Error al iniciar sesión",
            Mutation::Logout => "Error al cerrar sesión",
            Mutation::UpdateCourse { .. } => "Error al actualizar el curso",
            Mutation::CreateUnit { .. } => "Error al crear la unidad",
            Mutation::UpdateUnit { .. } => "Error al actualizar la unidad",
            Mutation::DeleteUnit { .. } => "Error al eliminar la unidad",
            Mutation::CreateTopic { .. } => "Error al crear el tema",
            Mutation::UpdateTopic { .. } => "Error al actualizar el tema",
            Mutation::DeleteTopic { .. } => "Error al eliminar el tema",
            Mutation::AnswerQuestion { .. } => "Error al responder la pregunta",
            Mutation::VoteQuestion { .. } => "Error al votar la pregunta",
        }
    }

    pub fn request(&self) -> Result<ApiRequest, ApiError> {
        let request = match self {
            Mutation::Login { email, password } => ApiRequest::with_body(
                HttpMethod::Post,
                "api/v1/auth/sign_in",
                self.encode(&SignInRequest {
                    email: email.clone(),
                    password: password.clone(),
                })?,
            ),
            Mutation::Logout => ApiRequest::without_body(HttpMethod::Delete, "api/v1/auth/sign_out"),
            Mutation::UpdateCourse { course_id, body } => ApiRequest::with_body(
                HttpMethod::Put,
                format!("api/v1/courses/{course_id}"),
                self.encode(body)?,
            ),
            Mutation::CreateUnit { course_id, body } => ApiRequest::with_body(
                HttpMethod::Post,
                format!("api/v1/courses/{course_id}/units"),
                self.encode(body)?,
            ),
            Mutation::UpdateUnit {
                course_id,
                unit_id,
                body,
            } => ApiRequest::with_body(
                HttpMethod::Put,
                format!("api/v1/courses/{course_id}/units/{unit_id}"),
                self.encode(body)?,
            ),
            Mutation::DeleteUnit { course_id, unit_id } => ApiRequest::without_body(
                HttpMethod::Delete,
                format!("api/v1/courses/{course_id}/units/{unit_id}"),
            ),
            Mutation::CreateTopic {
                course_id,
                unit_id,
                body,
            } => ApiRequest::with_body(
                HttpMethod::Post,
                format!("api/v1/courses/{course_id}/units/{unit_id}/topics"),
                self.encode(body)?,
            ),
            Mutation::UpdateTopic {
                course_id,
                unit_id,
                topic_id,
                body,
            } => ApiRequest::with_body(
                HttpMethod::Put,
                format!("api/v1/courses/{course_id}/units/{unit_id}/topics/{topic_id}"),
                self.encode(body)?,
            ),
            Mutation::DeleteTopic {
                course_id,
                unit_id,
                topic_id,
            } => ApiRequest::without_body(
                HttpMethod::Delete,
                format!("api/v1/courses/{course_id}/units/{unit_id}/topics/{topic_id}"),
            ),
            Mutation::AnswerQuestion {
                questionnaire_id,
                question_id,
                answer,
            } => ApiRequest::with_body(
                HttpMethod::Post,
                format!("api/v1/questionnaires/{questionnaire_id}/questions/{question_id}/answer"),
                self.encode(&AnswerRequest { answer: *answer })?,
            ),
            Mutation::VoteQuestion {
                questionnaire_id,
                question_id,
                action,
            } => ApiRequest::with_body(
                HttpMethod::Post,
                format!("api/v1/questionnaires/{questionnaire_id}/questions/{question_id}/vote"),
                self.encode(&VoteRequest { action: *action })?,
            ),
        };
        Ok(request)
    }

    /// Interpret a 2xx response: the caller-facing outcome plus the cache update.
    pub fn settle(&self, response: &ApiResponse) -> Result<Settled, ApiError> {
        let fallback = self.fallback_error();
        let settled = match self {
            Mutation::Login { .. } => {
                let user: UserPayload = response.json(fallback)?;
                Settled {
                    outcome: MutationOutcome::SignedIn {
                        session: session_from(response, user),
                    },
                    strategy: UpdateStrategy::Reset,
                }
            }
            Mutation::Logout => Settled {
                outcome: MutationOutcome::SignedOut,
                strategy: UpdateStrategy::Reset,
            },
            Mutation::UpdateCourse { course_id, .. }
            | Mutation::CreateUnit { course_id, .. }
            | Mutation::UpdateUnit { course_id, .. }
            | Mutation::DeleteUnit { course_id, .. }
            | Mutation::CreateTopic { course_id, .. }
            | Mutation::UpdateTopic { course_id, .. }
            | Mutation::DeleteTopic { course_id, .. } => Settled {
                outcome: MutationOutcome::Applied,
                strategy: UpdateStrategy::Invalidate(vec![Tag::Course(course_id.clone())]),
            },
            Mutation::AnswerQuestion {
                questionnaire_id, ..
            } => {
                let answer: AnswerResponse = response.json(fallback)?;
                let event = EventKind::QuestionAnswered {
                    questionnaire_id: *questionnaire_id,
                    question_id: answer.id,
                    correct: answer.correct,
                };
                Settled {
                    outcome: MutationOutcome::Answered { answer },
                    strategy: UpdateStrategy::Patch(event),
                }
            }
            Mutation::VoteQuestion {
                questionnaire_id,
                question_id,
                action,
            } => {
                // A report can change which questions the questionnaire serves.
                let tags = match action {
                    VoteAction::UpVote => vec![Tag::Question(*question_id)],
                    VoteAction::Report => vec![
                        Tag::Question(*question_id),
                        Tag::Questionnaire(*questionnaire_id),
                    ],
                };
                Settled {
                    outcome: MutationOutcome::Voted { action: *action },
                    strategy: UpdateStrategy::Invalidate(tags),
                }
            }
        };
        Ok(settled)
    }

    fn encode<T: Serialize>(&self, body: &T) -> Result<serde_json::Value, ApiError> {
        serde_json::to_value(body).map_err(|_| ApiError::transport(self.fallback_error()))
    }
}

fn session_from(response: &ApiResponse, user: UserPayload) -> Session {
    let meta = response.meta.clone();
    Session {
        access_token: meta.access_token,
        client: meta.client,
        uid: meta.uid,
        expiry: meta.expiry,
        user: UserProfile {
            name: user.name,
            email: user.email,
            nickname: user.nickname,
            role: user.role.and_then(|raw| raw.parse::<Role>().ok()),
            selected_course_id: user.selected_course_id,
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::transport::ResponseMeta;

    fn ok(body: serde_json::Value) -> ApiResponse {
        ApiResponse {
            status: 200,
            body: serde_json::to_vec(&body).expect("encode"),
            meta: ResponseMeta::default(),
        }
    }

    #[test]
    fn structural_writes_invalidate_the_course() {
        let mutation = Mutation::CreateUnit {
            course_id: "4".into(),
            body: UnitBody {
                name: Some("Bonos".into()),
                description: Some("Renta fija".into()),
                position: None,
            },
        };

        let request = mutation.request().expect("request");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.path, "api/v1/courses/4/units");
        assert_eq!(
            request.body,
            Some(json!({"name": "Bonos", "description": "Renta fija"}))
        );

        let settled = mutation.settle(&ok(json!({"data": {}}))).expect("settle");
        assert_eq!(
            settled.strategy,
            UpdateStrategy::Invalidate(vec![Tag::Course("4".into())])
        );
    }

    #[test]
    fn answer_patches_with_the_response_outcome() {
        let mutation = Mutation::AnswerQuestion {
            questionnaire_id: 12,
            question_id: 40,
            answer: 2,
        };

        let request = mutation.request().expect("request");
        assert_eq!(request.path, "api/v1/questionnaires/12/questions/40/answer");
        assert_eq!(request.body, Some(json!({"answer": 2})));

        let settled = mutation
            .settle(&ok(json!({"data": {"id": 40, "correct": true, "explanation": "ok"}})))
            .expect("settle");
        assert_eq!(
            settled.strategy,
            UpdateStrategy::Patch(EventKind::QuestionAnswered {
                questionnaire_id: 12,
                question_id: 40,
                correct: true,
            })
        );
    }

    #[test]
    fn report_invalidates_more_than_up_vote() {
        let vote = |action| Mutation::VoteQuestion {
            questionnaire_id: 12,
            question_id: 40,
            action,
        };

        let up = vote(VoteAction::UpVote).settle(&ok(json!({}))).expect("up");
        assert_eq!(up.strategy, UpdateStrategy::Invalidate(vec![Tag::Question(40)]));

        let report = vote(VoteAction::Report).settle(&ok(json!({}))).expect("report");
        assert_eq!(
            report.strategy,
            UpdateStrategy::Invalidate(vec![Tag::Question(40), Tag::Questionnaire(12)])
        );

        let request = vote(VoteAction::Report).request().expect("request");
        assert_eq!(request.path, "api/v1/questionnaires/12/questions/40/vote");
        assert_eq!(request.body, Some(json!({"action": "report"})));
    }

    #[test]
    fn login_builds_the_session_from_headers_and_body() {
        let mutation = Mutation::Login {
            email: "ada@example.com".into(),
            password: "secret".into(),
        };
        let mut response = ok(json!({"data": {
            "name": "Ada",
            "nickname": "ada",
            "email": "ada@example.com",
            "role": "student",
            "selected_course_id": 5
        }}));
        response.meta = ResponseMeta {
            access_token: Some("tok".into()),
            client: Some("cli".into()),
            uid: Some("ada@example.com".into()),
            expiry: Some("4102444800".into()),
        };

        let settled = mutation.settle(&response).expect("settle");
        assert_eq!(settled.strategy, UpdateStrategy::Reset);
        let MutationOutcome::SignedIn { session } = settled.outcome else {
            panic!("expected a signed-in outcome");
        };
        assert_eq!(session.access_token.as_deref(), Some("tok"));
        assert_eq!(session.user.role, Some(Role::Student));
        assert_eq!(session.user.selected_course_id.as_deref(), Some("5"));
    }

    #[test]
    fn delete_topic_has_no_body() {
        let request = Mutation::DeleteTopic {
            course_id: "1".into(),
            unit_id: 2,
            topic_id: 3,
        }
        .request()
        .expect("request");
        assert_eq!(request.method, HttpMethod::Delete);
        assert_eq!(request.path, "api/v1/courses/1/units/2/topics/3");
        assert!(request.body.is_none());
    }
}
