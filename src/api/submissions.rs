use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStaff, CurrentUser};
use crate::core::state::AppState;
use crate::schemas::submission::{
    AnswerDetailResponse, AnswerResponse, SaveAnswerRequest, SubmissionDetailResponse,
    SubmissionResponse, SubmitExamResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/:submission_id",
            get(get_submission_detail).delete(reset_submission),
        )
        .route("/:submission_id/answers", post(save_answer))
        .route("/:submission_id/submit", post(submit_exam))
}

async fn save_answer(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::validation(e.to_string()))?;

    let max_chars = state.settings().exam().max_answer_chars as usize;
    if payload.answer.chars().count() > max_chars {
        return Err(ApiError::validation(format!(
            "answer exceeds the {max_chars} character limit"
        )));
    }

    let answer = state
        .sessions()
        .save_answer(&submission_id, &payload.question_id, &payload.answer, &user)
        .await?;
    Ok(Json(AnswerResponse::from_model(&answer)))
}

async fn submit_exam(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> Result<Json<SubmitExamResponse>, ApiError> {
    let submitted = state.sessions().submit_exam(&submission_id, &user).await?;
    Ok(Json(SubmitExamResponse::from_outcome(&submitted)))
}

async fn get_submission_detail(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> Result<Json<SubmissionDetailResponse>, ApiError> {
    let detail = state.sessions().submission_detail(&submission_id, &user).await?;
    Ok(Json(SubmissionDetailResponse {
        submission: SubmissionResponse::from_model(&detail.submission),
        answers: detail.answers.iter().map(AnswerDetailResponse::from_joined).collect(),
    }))
}

async fn reset_submission(
    CurrentStaff(staff): CurrentStaff,
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.sessions().reset_submission(&submission_id, &staff).await?;
    Ok(StatusCode::NO_CONTENT)
}
