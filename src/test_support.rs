use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use time::{Duration, PrimitiveDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::time::{primitive_now_utc, Clock};
use crate::core::{config::Settings, security, state::AppState};
use crate::db::models::{Exam, Question, User};
use crate::db::types::{QuestionType, UserRole};
use crate::repositories::MemoryStore;

const TEST_SECRET_KEY: &str = "test-secret";

/// Test clock with a hand-cranked dial. Start/submit/expiry scenarios advance
/// it explicitly instead of sleeping.
pub(crate) struct ManualClock {
    now: StdMutex<PrimitiveDateTime>,
}

impl ManualClock {
    pub(crate) fn new(start: PrimitiveDateTime) -> Self {
        Self { now: StdMutex::new(start) }
    }

    pub(crate) fn now(&self) -> PrimitiveDateTime {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn set(&self, to: PrimitiveDateTime) {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = to;
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> PrimitiveDateTime {
        ManualClock::now(self)
    }
}

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) clock: Arc<ManualClock>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAMHALL_ENV", "test");
    std::env::set_var("EXAMHALL_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("DATABASE_BACKEND", "memory");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("MAX_ANSWER_CHARS");
    std::env::remove_var("SAVE_GRACE_SECONDS");
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(primitive_now_utc()));

    let state = AppState::new(settings, store.clone(), clock.clone());
    let app = api::router::router(state.clone());

    TestContext { state, app, store, clock, _guard: guard }
}

/// Memory-backed state for tests that manage the environment themselves.
pub(crate) fn memory_state(settings: Settings) -> AppState {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(primitive_now_utc()));
    AppState::new(settings, store, clock)
}

impl TestContext {
    pub(crate) fn insert_student(&self, id: &str) -> User {
        let user = student(id);
        self.store.insert_user(user.clone());
        user
    }

    pub(crate) fn insert_teacher(&self, id: &str) -> User {
        let user = teacher(id);
        self.store.insert_user(user.clone());
        user
    }

    /// Exam currently open for attempts: window spans two hours around the
    /// clock's present position.
    pub(crate) fn insert_open_exam(&self, id: &str, duration_minutes: i32) {
        let now = self.clock.now();
        self.insert_exam_with_window(
            id,
            duration_minutes,
            now - Duration::hours(2),
            now + Duration::hours(2),
        );
    }

    pub(crate) fn insert_exam_with_window(
        &self,
        id: &str,
        duration_minutes: i32,
        start_time: PrimitiveDateTime,
        end_time: PrimitiveDateTime,
    ) {
        self.store.insert_exam(exam(id, duration_minutes, start_time, end_time));
    }

    pub(crate) fn insert_question(
        &self,
        id: &str,
        question_type: QuestionType,
        correct_answer: &str,
        points: i32,
    ) {
        self.store.insert_question(question(id, question_type, correct_answer, points));
    }

    pub(crate) fn attach_question(&self, exam_id: &str, question_id: &str) {
        self.store.attach_question(exam_id, question_id);
    }

    pub(crate) fn bearer_token(&self, user: &User) -> String {
        security::create_access_token(&user.id, user.role, self.state.settings(), None)
            .expect("token")
    }
}

pub(crate) fn student(id: &str) -> User {
    user(id, UserRole::Student)
}

pub(crate) fn teacher(id: &str) -> User {
    user(id, UserRole::Teacher)
}

fn user(id: &str, role: UserRole) -> User {
    let now = primitive_now_utc();
    User {
        id: id.to_string(),
        username: id.to_string(),
        full_name: format!("Test User {id}"),
        role,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn exam(
    id: &str,
    duration_minutes: i32,
    start_time: PrimitiveDateTime,
    end_time: PrimitiveDateTime,
) -> Exam {
    Exam {
        id: id.to_string(),
        title: "Algorithms Midterm".to_string(),
        description: None,
        duration_minutes,
        start_time,
        end_time,
        created_by: "teacher-1".to_string(),
        created_at: start_time,
        updated_at: start_time,
    }
}

pub(crate) fn question(
    id: &str,
    question_type: QuestionType,
    correct_answer: &str,
    points: i32,
) -> Question {
    Question {
        id: id.to_string(),
        question_type,
        text: format!("Question {id}"),
        options: None,
        correct_answer: correct_answer.to_string(),
        points,
        created_at: primitive_now_utc(),
    }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
