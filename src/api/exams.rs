use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::submission::StartExamResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:exam_id/start", post(start_exam))
}

/// Begin or resume the caller's attempt at an exam. Idempotent while the
/// attempt is in progress: repeated calls return the same submission with the
/// countdown recomputed from its original start.
async fn start_exam(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<Json<StartExamResponse>, ApiError> {
    let started = state.sessions().start_exam(&exam_id, &user).await?;
    Ok(Json(StartExamResponse::from_outcome(&started)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use time::Duration;
    use tower::ServiceExt;

    use crate::db::types::QuestionType;
    use crate::test_support::{self, json_request, read_json};

    #[tokio::test]
    async fn start_requires_authentication() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/exams/exam-1/start", None, None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn start_unknown_exam_returns_404_with_code() {
        let ctx = test_support::setup_test_context().await;
        let student = ctx.insert_student("alice");
        let token = ctx.bearer_token(&student);

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/exams/no-such-exam/start",
                Some(&token),
                None,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_json(response).await;
        assert_eq!(body["code"], "exam_not_found");
    }

    #[tokio::test]
    async fn start_outside_window_returns_400() {
        let ctx = test_support::setup_test_context().await;
        let student = ctx.insert_student("alice");
        let token = ctx.bearer_token(&student);

        let now = ctx.clock.now();
        ctx.insert_exam_with_window("future", 30, now + Duration::hours(1), now + Duration::hours(2));
        ctx.insert_exam_with_window("past", 30, now - Duration::hours(2), now - Duration::hours(1));

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/exams/future/start", Some(&token), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["code"], "window_not_open");

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/exams/past/start", Some(&token), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["code"], "window_closed");
    }

    #[tokio::test]
    async fn start_then_restart_resumes_the_same_attempt() {
        let ctx = test_support::setup_test_context().await;
        let student = ctx.insert_student("alice");
        let token = ctx.bearer_token(&student);
        ctx.insert_open_exam("exam-1", 30);
        ctx.insert_question("q1", QuestionType::MultipleChoice, "A", 10);
        ctx.attach_question("exam-1", "q1");

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/exams/exam-1/start", Some(&token), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let first = read_json(response).await;
        assert_eq!(first["resumed"], false);
        assert_eq!(first["remaining_seconds"], 1800);
        assert_eq!(first["submission"]["status"], "in_progress");

        ctx.clock.advance(Duration::minutes(10));

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/exams/exam-1/start", Some(&token), None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let second = read_json(response).await;
        assert_eq!(second["resumed"], true);
        assert_eq!(second["remaining_seconds"], 1200);
        assert_eq!(second["submission"]["id"], first["submission"]["id"]);
    }
}
