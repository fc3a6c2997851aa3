use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{Answer, Question, Submission};
use crate::db::types::{QuestionType, SubmissionStatus};
use crate::services::session::{AnswerWithQuestion, StartedExam, SubmittedExam};

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) user_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) score: Option<i32>,
}

impl SubmissionResponse {
    pub(crate) fn from_model(submission: &Submission) -> Self {
        Self {
            id: submission.id.clone(),
            exam_id: submission.exam_id.clone(),
            user_id: submission.user_id.clone(),
            status: submission.status,
            started_at: format_primitive(submission.started_at),
            submitted_at: submission.submitted_at.map(format_primitive),
            score: submission.score,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) question_id: String,
    pub(crate) answer: String,
    pub(crate) updated_at: String,
}

impl AnswerResponse {
    pub(crate) fn from_model(answer: &Answer) -> Self {
        Self {
            question_id: answer.question_id.clone(),
            answer: answer.answer_text.clone(),
            updated_at: format_primitive(answer.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StartExamResponse {
    pub(crate) submission: SubmissionResponse,
    pub(crate) remaining_seconds: i64,
    pub(crate) resumed: bool,
    pub(crate) answers: Vec<AnswerResponse>,
}

impl StartExamResponse {
    pub(crate) fn from_outcome(started: &StartedExam) -> Self {
        Self {
            submission: SubmissionResponse::from_model(&started.submission),
            remaining_seconds: started.remaining_seconds,
            resumed: started.resumed,
            answers: started.answers.iter().map(AnswerResponse::from_model).collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SaveAnswerRequest {
    #[validate(length(min = 1, max = 64))]
    pub(crate) question_id: String,
    pub(crate) answer: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitExamResponse {
    pub(crate) submission: SubmissionResponse,
    pub(crate) score: i32,
    pub(crate) correct_count: i32,
    pub(crate) graded_count: i32,
    pub(crate) total_answered: i32,
}

impl SubmitExamResponse {
    pub(crate) fn from_outcome(submitted: &SubmittedExam) -> Self {
        Self {
            submission: SubmissionResponse::from_model(&submitted.submission),
            score: submitted.summary.score,
            correct_count: submitted.summary.correct_count,
            graded_count: submitted.summary.graded_count,
            total_answered: submitted.summary.total_answered,
        }
    }
}

/// Catalog context echoed next to an answer in the review view. Includes the
/// correct answer; the detail endpoint is only reachable post-ownership-check.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionContextResponse {
    pub(crate) text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Option<serde_json::Value>,
    pub(crate) correct_answer: String,
    pub(crate) points: i32,
}

impl QuestionContextResponse {
    fn from_model(question: &Question) -> Self {
        Self {
            text: question.text.clone(),
            question_type: question.question_type,
            options: question.options.as_ref().map(|opts| opts.0.clone()),
            correct_answer: question.correct_answer.clone(),
            points: question.points,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerDetailResponse {
    pub(crate) question_id: String,
    pub(crate) answer: String,
    pub(crate) updated_at: String,
    pub(crate) question: Option<QuestionContextResponse>,
}

impl AnswerDetailResponse {
    pub(crate) fn from_joined(joined: &AnswerWithQuestion) -> Self {
        Self {
            question_id: joined.answer.question_id.clone(),
            answer: joined.answer.answer_text.clone(),
            updated_at: format_primitive(joined.answer.updated_at),
            question: joined.question.as_ref().map(QuestionContextResponse::from_model),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionDetailResponse {
    pub(crate) submission: SubmissionResponse,
    pub(crate) answers: Vec<AnswerDetailResponse>,
}
