pub(crate) mod memory;
pub(crate) mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{Answer, Exam, Question, Submission, User};
use crate::db::types::SubmissionStatus;

pub(crate) use memory::MemoryStore;
pub(crate) use postgres::PgStore;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    /// Unique-constraint race on submission creation. The caller resolves it
    /// by re-reading the row that won.
    #[error("submission already exists for this exam and user")]
    Conflict,
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Conflict;
            }
        }
        StoreError::Backend(err.to_string())
    }
}

#[derive(Debug)]
pub(crate) struct NewSubmission<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) status: SubmissionStatus,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Persistence capability set for the session lifecycle. The original system
/// carried two parallel controller implementations over different storage
/// clients; both collapse into adapters of this one trait (`PgStore`,
/// `MemoryStore`), so the lifecycle rules live in exactly one place.
#[async_trait]
pub(crate) trait ExamStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    // Catalog reads (owned by the authoring subsystem; read-only here).
    async fn find_exam(&self, exam_id: &str) -> Result<Option<Exam>, StoreError>;
    async fn list_exam_questions(&self, exam_id: &str) -> Result<Vec<Question>, StoreError>;

    // Users are consumed for ownership checks and report usernames only.
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;
    async fn list_users_by_ids(&self, ids: &[String]) -> Result<Vec<User>, StoreError>;

    // Submission lifecycle.
    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError>;
    async fn find_latest_submission(
        &self,
        exam_id: &str,
        user_id: &str,
    ) -> Result<Option<Submission>, StoreError>;
    /// Creation must be atomic per (exam, user): a concurrent duplicate must
    /// surface as `StoreError::Conflict`, never as a second active row.
    async fn create_submission(&self, new: NewSubmission<'_>) -> Result<Submission, StoreError>;
    /// Guarded conditional update `in_progress -> submitted`. Returns false
    /// when the row was not in progress, so a double submit never re-grades.
    async fn transition_to_submitted(
        &self,
        id: &str,
        score: i32,
        submitted_at: PrimitiveDateTime,
    ) -> Result<bool, StoreError>;
    /// Administrative reset: removes the submission and its answers, returning
    /// the (exam, user) pair to the blank state. Returns false when absent.
    async fn delete_submission(&self, id: &str) -> Result<bool, StoreError>;

    // Answers.
    async fn upsert_answer(
        &self,
        submission_id: &str,
        question_id: &str,
        answer_text: &str,
        updated_at: PrimitiveDateTime,
    ) -> Result<Answer, StoreError>;
    async fn list_answers(&self, submission_id: &str) -> Result<Vec<Answer>, StoreError>;

    // Reporting reads.
    async fn list_submissions_by_exam(&self, exam_id: &str) -> Result<Vec<Submission>, StoreError>;
    async fn list_submissions_by_user(&self, user_id: &str) -> Result<Vec<Submission>, StoreError>;
    async fn list_answers_by_exam(&self, exam_id: &str) -> Result<Vec<Answer>, StoreError>;
}
