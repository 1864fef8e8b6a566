//! Host wiring: session, transport, cache and navigation assembled into one
//! handle the binary drives.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use finquiz_api_types::{AnswerResponse, VoteAction};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{ApiError, HttpTransport, Mutation, MutationOutcome, Transport};
use crate::cache::{CacheConfig, CachedData, QueryClient, QueryKey, QueryState, Subscription};
use crate::config::Settings;
use crate::guard::{
    ANONYMOUS_ENTRY, Location, Navigation, Navigator, RouteParams, RouteTable, SessionGuard, View,
};
use crate::session::{
    ExpiryHandler, ExpiryWatcher, FileStorage, Session, SessionProvider, SessionStorage,
};
use crate::util::lock::mutex_lock;

mod error;

pub use error::AppError;

const SOURCE: &str = "finquiz::app";
const NOTICE_CAPACITY: usize = 16;
const REPORTS_FIRST_PAGE: u32 = 1;

pub const SESSION_EXPIRED_MESSAGE: &str =
    "Tu sesión ha expirado. Por favor, inicia sesión nuevamente.";

/// Out-of-band message for the actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum SessionNotice {
    Expired { message: String },
}

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub cache: CacheConfig,
    pub expiry_check_interval: Duration,
    pub default_course_id: String,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            expiry_check_interval: crate::session::expiry::DEFAULT_CHECK_INTERVAL,
            default_course_id: "1".to_string(),
        }
    }
}

impl From<&Settings> for AppOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            cache: CacheConfig::from(&settings.cache),
            expiry_check_interval: settings.session.expiry_check_interval,
            default_course_id: settings.session.default_course_id.clone(),
        }
    }
}

/// One query result as loaded for a page.
#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub key: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CachedData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl PageData {
    pub fn from_state(key: &QueryKey, state: &QueryState) -> Self {
        Self {
            key: key.to_string(),
            status: state.status.as_str(),
            data: state.data.as_deref().cloned(),
            error: state.error.clone(),
        }
    }
}

/// Rendered outcome of [`App::open`].
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub location: Location,
    pub redirects: Vec<String>,
    pub data: Vec<PageData>,
}

impl Page {
    pub fn view(&self) -> View {
        self.location.view
    }

    pub fn params(&self) -> &RouteParams {
        &self.location.params
    }
}

/// Subscriptions held by the page currently shown.
type PageSlot = Arc<Mutex<Vec<Subscription>>>;

pub struct App {
    session: Arc<SessionProvider>,
    client: QueryClient,
    navigator: Arc<Navigator>,
    notices: broadcast::Sender<SessionNotice>,
    page: PageSlot,
    watcher: ExpiryWatcher,
    sweeper: JoinHandle<()>,
}

impl App {
    /// Build the application from resolved settings. Must run inside a Tokio runtime.
    pub fn new(settings: &Settings) -> Result<Self, AppError> {
        let storage: Arc<dyn SessionStorage> =
            Arc::new(FileStorage::open(&settings.session.storage_path));
        let session = Arc::new(SessionProvider::new(storage));
        let transport = HttpTransport::new(
            settings.api.base_url.clone(),
            settings.api.timeout,
            session.clone(),
        )?;
        Self::from_parts(AppOptions::from(settings), session, Arc::new(transport))
    }

    pub fn from_parts(
        options: AppOptions,
        session: Arc<SessionProvider>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, AppError> {
        let client = QueryClient::new(options.cache.clone(), transport, session.clone());
        let navigator = Arc::new(Navigator::new(
            RouteTable::finquiz()?,
            SessionGuard::new(options.default_course_id),
            session.clone(),
        ));
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let page = PageSlot::default();

        let handler = Arc::new(ForcedLogout {
            client: client.clone(),
            navigator: navigator.clone(),
            notices: notices.clone(),
            page: page.clone(),
        });
        let watcher = ExpiryWatcher::spawn(session.clone(), options.expiry_check_interval, handler);
        let sweeper = client.spawn_sweeper();

        Ok(Self {
            session,
            client,
            navigator,
            notices,
            page,
            watcher,
            sweeper,
        })
    }

    pub fn session(&self) -> Session {
        self.session.get()
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    pub fn home_path(&self) -> String {
        self.navigator.guard().home_path(&self.session.get())
    }

    /// Navigate to `path` through the guard and load the landing view's data.
    ///
    /// The previous page's subscriptions are released once the new page has
    /// loaded, so entries shared by both pages are never left idle.
    pub async fn open(&self, path: &str) -> Result<Page, AppError> {
        let Navigation {
            location,
            redirects,
            ..
        } = self.navigator.navigate(path)?;

        let mut subscriptions = Vec::new();
        let mut data = Vec::new();
        for key in view_queries(&location)? {
            let (subscription, state) = self.load(key).await;
            data.push(PageData::from_state(subscription.key(), &state));

            let next = state
                .data
                .as_deref()
                .and_then(CachedData::as_questionnaire)
                .filter(|_| location.view == View::Questionnaire)
                .and_then(|questionnaire| {
                    crate::cache::current_question(questionnaire).map(|question_id| {
                        QueryKey::Question {
                            questionnaire_id: questionnaire.id,
                            question_id,
                        }
                    })
                });
            subscriptions.push(subscription);

            if let Some(key) = next {
                let (subscription, state) = self.load(key).await;
                data.push(PageData::from_state(subscription.key(), &state));
                subscriptions.push(subscription);
            }
        }

        *mutex_lock(&self.page, SOURCE, "open") = subscriptions;
        info!(path = %location.path, view = ?location.view, queries = data.len(), "Page opened");

        Ok(Page {
            location,
            redirects,
            data,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let outcome = self
            .client
            .mutate(Mutation::Login {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        match outcome {
            MutationOutcome::SignedIn { session } => Ok(session),
            other => Err(AppError::unexpected(format!(
                "sign in settled as {other:?}"
            ))),
        }
    }

    /// Sign out remotely; the local session is only dropped on success.
    pub async fn logout(&self) -> Result<(), AppError> {
        self.client.mutate(Mutation::Logout).await?;
        release_page(&self.page);
        self.navigator.force(ANONYMOUS_ENTRY)?;
        Ok(())
    }

    pub async fn answer(
        &self,
        questionnaire_id: u64,
        question_id: u64,
        answer: u64,
    ) -> Result<AnswerResponse, AppError> {
        let outcome = self
            .client
            .mutate(Mutation::AnswerQuestion {
                questionnaire_id,
                question_id,
                answer,
            })
            .await?;
        match outcome {
            MutationOutcome::Answered { answer } => Ok(answer),
            other => Err(AppError::unexpected(format!(
                "answer settled as {other:?}"
            ))),
        }
    }

    pub async fn vote(
        &self,
        questionnaire_id: u64,
        question_id: u64,
        action: VoteAction,
    ) -> Result<(), AppError> {
        self.client
            .mutate(Mutation::VoteQuestion {
                questionnaire_id,
                question_id,
                action,
            })
            .await?;
        Ok(())
    }

    /// Step a questionnaire to its next question locally and return the
    /// patched entry, if cached.
    pub fn advance(&self, questionnaire_id: u64) -> Option<QueryState> {
        self.client.advance_questionnaire(questionnaire_id);
        self.client.state(&QueryKey::Questionnaire {
            id: questionnaire_id,
        })
    }

    async fn load(&self, key: QueryKey) -> (Subscription, QueryState) {
        let mut subscription = self.client.subscribe(key);
        let state = subscription.load().await;
        (subscription, state)
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.watcher.stop();
        self.sweeper.abort();
    }
}

/// Queries a view needs before it can render. The questionnaire view also
/// loads its current question once the questionnaire is known.
fn view_queries(location: &Location) -> Result<Vec<QueryKey>, AppError> {
    let keys = match location.view {
        View::Course => vec![QueryKey::CourseInfo {
            course_id: text_param(location, "id")?,
        }],
        View::Reports => vec![QueryKey::CourseReports {
            course_id: text_param(location, "courseId")?,
            page: REPORTS_FIRST_PAGE,
        }],
        View::MyQuestionnaires => vec![QueryKey::Questionnaires, QueryKey::StudentStats],
        View::Questionnaire => vec![QueryKey::Questionnaire {
            id: id_param(location, "id")?,
        }],
        View::QuestionnaireSummary => vec![QueryKey::QuestionnaireSummary {
            id: id_param(location, "id")?,
        }],
        View::Login | View::NotFound => Vec::new(),
    };
    Ok(keys)
}

fn text_param(location: &Location, name: &'static str) -> Result<String, AppError> {
    location
        .param(name)
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidParameter {
            name,
            value: String::new(),
        })
}

fn id_param(location: &Location, name: &'static str) -> Result<u64, AppError> {
    let value = location.param(name).unwrap_or_default();
    value.parse().map_err(|_| AppError::InvalidParameter {
        name,
        value: value.to_string(),
    })
}

/// Drop the current page's subscriptions so its entries can be collected.
fn release_page(page: &Mutex<Vec<Subscription>>) {
    let released = std::mem::take(&mut *mutex_lock(page, SOURCE, "release_page"));
    drop(released);
}

/// Expiry reaction: leave the page, drop cached data, return to the login
/// view and tell the actor.
struct ForcedLogout {
    client: QueryClient,
    navigator: Arc<Navigator>,
    notices: broadcast::Sender<SessionNotice>,
    page: PageSlot,
}

impl ExpiryHandler for ForcedLogout {
    fn session_expired(&self, expired: &Session) {
        release_page(&self.page);
        self.client.reset();
        if let Err(err) = self.navigator.force(ANONYMOUS_ENTRY) {
            warn!(error = %err, "Failed to return to the login view");
        }
        // No receiver is fine; the notice is best effort.
        let _ = self.notices.send(SessionNotice::Expired {
            message: SESSION_EXPIRED_MESSAGE.to_string(),
        });
        info!(uid = expired.uid.as_deref().unwrap_or_default(), "Forced logout after expiry");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::fake::ScriptedTransport;
    use crate::api::{HttpMethod, ResponseMeta};
    use crate::cache::QueryStatus;
    use crate::session::{MemoryStorage, Role, UserProfile, now_unix};

    fn student(expiry: i64) -> Session {
        Session {
            access_token: Some("token".into()),
            client: Some("client".into()),
            uid: Some("ana@example.com".into()),
            expiry: Some(expiry.to_string()),
            user: UserProfile {
                name: Some("Ana".into()),
                role: Some(Role::Student),
                selected_course_id: Some("3".into()),
                ..Default::default()
            },
        }
    }

    fn app(transport: Arc<ScriptedTransport>, session: Option<Session>) -> App {
        let provider = Arc::new(SessionProvider::new(Arc::new(MemoryStorage::new())));
        if let Some(session) = session {
            provider.set(session).expect("session");
        }
        App::from_parts(AppOptions::default(), provider, transport).expect("app")
    }

    fn questionnaire(position: usize) -> serde_json::Value {
        json!({"data": {
            "id": 4,
            "name": "Bonos",
            "questions": [{"id": 8, "correct": null}, {"id": 9, "correct": null}],
            "currentPosition": position
        }})
    }

    fn question(id: u64) -> serde_json::Value {
        json!({"data": {"id": id, "title": "Pregunta", "stem": "¿?", "options": [{"id": 1, "text": "a"}]}})
    }

    #[tokio::test]
    async fn questionnaire_view_loads_the_current_question() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(HttpMethod::Get, "api/v1/questionnaires/4", 200, questionnaire(1));
        transport.respond(
            HttpMethod::Get,
            "api/v1/questionnaires/4/questions/9",
            200,
            question(9),
        );
        let app = app(transport.clone(), Some(student(now_unix() + 3600)));

        let page = app.open("/questionnaires/4").await.expect("page");

        assert_eq!(page.view(), View::Questionnaire);
        assert_eq!(page.data.len(), 2);
        assert!(page.data.iter().all(|entry| entry.status == "success"));
        assert_eq!(
            transport.calls(HttpMethod::Get, "api/v1/questionnaires/4/questions/9"),
            1
        );
    }

    #[tokio::test]
    async fn finished_questionnaire_skips_the_question_fetch() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(HttpMethod::Get, "api/v1/questionnaires/4", 200, questionnaire(2));
        let app = app(transport.clone(), Some(student(now_unix() + 3600)));

        let page = app.open("/questionnaires/4").await.expect("page");

        assert_eq!(page.data.len(), 1);
        assert_eq!(transport.total_calls(), 1);
    }

    #[tokio::test]
    async fn anonymous_open_lands_on_login_without_requests() {
        let transport = Arc::new(ScriptedTransport::new());
        let app = app(transport.clone(), None);

        let page = app.open("/questionnaires").await.expect("page");

        assert_eq!(page.view(), View::Login);
        assert_eq!(page.redirects, vec!["/".to_string()]);
        assert!(page.data.is_empty());
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn non_numeric_questionnaire_id_is_rejected() {
        let app = app(
            Arc::new(ScriptedTransport::new()),
            Some(student(now_unix() + 3600)),
        );
        let err = app.open("/questionnaires/abc").await.expect_err("bad id");
        assert!(matches!(
            err,
            AppError::InvalidParameter { name: "id", ref value } if value == "abc"
        ));
    }

    #[tokio::test]
    async fn login_persists_session_and_leaves_login_view() {
        let transport = Arc::new(ScriptedTransport::new());
        let expiry = (now_unix() + 3600).to_string();
        transport.respond_with_meta(
            HttpMethod::Post,
            "api/v1/auth/sign_in",
            200,
            json!({"data": {"name": "Tomás", "email": "tomas@example.com", "role": "teacher", "selected_course_id": 5}}),
            ResponseMeta {
                access_token: Some("t".into()),
                client: Some("c".into()),
                uid: Some("tomas@example.com".into()),
                expiry: Some(expiry),
            },
        );
        transport.respond(
            HttpMethod::Get,
            "api/v1/courses/5",
            200,
            json!({"data": {"id": 5, "name": "Finanzas", "units": []}}),
        );
        let app = app(transport, None);

        let session = app.login("tomas@example.com", "secret").await.expect("login");
        assert_eq!(session.role(), Some(Role::Teacher));
        assert_eq!(app.home_path(), "/courses/5");

        let page = app.open("/").await.expect("page");
        assert_eq!(page.view(), View::Course);
        assert_eq!(page.location.path, "/courses/5");
    }

    #[tokio::test]
    async fn failed_login_surfaces_server_message() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            HttpMethod::Post,
            "api/v1/auth/sign_in",
            401,
            json!({"errors": ["Credenciales inválidas"]}),
        );
        let app = app(transport, None);

        let err = app.login("ana@example.com", "bad").await.expect_err("rejected");
        assert_eq!(err.notice(), "Credenciales inválidas");
        assert!(!app.session().has_token());
    }

    #[tokio::test]
    async fn advance_patches_the_cached_questionnaire() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(HttpMethod::Get, "api/v1/questionnaires/4", 200, questionnaire(0));
        transport.respond(
            HttpMethod::Get,
            "api/v1/questionnaires/4/questions/8",
            200,
            question(8),
        );
        let app = app(transport, Some(student(now_unix() + 3600)));
        app.open("/questionnaires/4").await.expect("page");

        let state = app.advance(4).expect("cached");
        assert_eq!(state.status, QueryStatus::Success);
        let position = state
            .data
            .as_deref()
            .and_then(CachedData::as_questionnaire)
            .map(|questionnaire| questionnaire.current_position);
        assert_eq!(position, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_forces_logout_and_releases_the_page() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            HttpMethod::Get,
            "api/v1/courses/3",
            200,
            json!({"data": {"id": 3, "name": "Finanzas", "units": []}}),
        );
        let app = app(transport, Some(student(now_unix() + 3600)));
        let mut notices = app.notices();
        app.open("/courses/3").await.expect("page");

        // Expiry compares against the wall clock, which paused time leaves alone.
        app.session
            .set(student(now_unix() - 1))
            .expect("expire session");

        let notice = notices.recv().await.expect("notice");
        assert_eq!(
            notice,
            SessionNotice::Expired {
                message: SESSION_EXPIRED_MESSAGE.to_string()
            }
        );
        assert!(!app.session().has_token());
        assert_eq!(app.navigator().current().map(|l| l.view), Some(View::Login));
        assert_eq!(app.client().entry_count(), 0);
        assert!(
            app.client()
                .state(&QueryKey::CourseInfo {
                    course_id: "3".into()
                })
                .is_none()
        );
    }
}
