use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::report::{
    ExamReportResponse, QuestionAnalyticsResponse, StudentPerformanceResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/exams/:exam_id", get(exam_report))
        .route("/exams/:exam_id/questions", get(question_analytics))
        .route("/students/:user_id", get(student_performance))
}

async fn exam_report(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<Json<ExamReportResponse>, ApiError> {
    let report = state.reports().exam_report(&exam_id, &user).await?;
    Ok(Json(ExamReportResponse::from_report(&report)))
}

async fn question_analytics(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<Json<Vec<QuestionAnalyticsResponse>>, ApiError> {
    let stats = state.reports().question_analytics(&exam_id, &user).await?;
    Ok(Json(stats.iter().map(QuestionAnalyticsResponse::from_stat).collect()))
}

/// Students may fetch their own row; anything else needs staff. The role
/// check lives in the service so both rules stay in one place.
async fn student_performance(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<StudentPerformanceResponse>, ApiError> {
    let performance = state.reports().student_performance(&user_id, &user).await?;
    Ok(Json(StudentPerformanceResponse::from_performance(&performance)))
}
