use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Answer, Exam, Question, Submission, User};
use crate::db::types::SubmissionStatus;

use super::{ExamStore, NewSubmission, StoreError};

const SUBMISSION_COLUMNS: &str =
    "id, exam_id, user_id, status, started_at, submitted_at, score, created_at, updated_at";

const ANSWER_COLUMNS: &str = "submission_id, question_id, answer_text, updated_at";

/// sqlx adapter. The at-most-one-active / at-most-one-terminal invariants are
/// enforced by partial unique indexes on exam_submissions, and the submit
/// transition is a conditional UPDATE guarded on status.
#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_exam(&self, exam_id: &str) -> Result<Option<Exam>, StoreError> {
        let exam = sqlx::query_as::<_, Exam>(
            "SELECT id, title, description, duration_minutes, start_time, end_time,
                    created_by, created_at, updated_at
             FROM exams
             WHERE id = $1",
        )
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(exam)
    }

    async fn list_exam_questions(&self, exam_id: &str) -> Result<Vec<Question>, StoreError> {
        let questions = sqlx::query_as::<_, Question>(
            "SELECT q.id, q.question_type, q.text, q.options, q.correct_answer,
                    q.points, q.created_at
             FROM questions q
             JOIN exam_questions eq ON eq.question_id = q.id
             WHERE eq.exam_id = $1
             ORDER BY eq.order_index",
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, full_name, role, is_active, created_at, updated_at
             FROM users
             WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users_by_ids(&self, ids: &[String]) -> Result<Vec<User>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, full_name, role, is_active, created_at, updated_at
             FROM users
             WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
        let submission = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS}
             FROM exam_submissions
             WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(submission)
    }

    async fn find_latest_submission(
        &self,
        exam_id: &str,
        user_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        let submission = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS}
             FROM exam_submissions
             WHERE exam_id = $1 AND user_id = $2
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(exam_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(submission)
    }

    async fn create_submission(&self, new: NewSubmission<'_>) -> Result<Submission, StoreError> {
        let submission = sqlx::query_as::<_, Submission>(&format!(
            "INSERT INTO exam_submissions
                 (id, exam_id, user_id, status, started_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(new.id)
        .bind(new.exam_id)
        .bind(new.user_id)
        .bind(new.status)
        .bind(new.started_at)
        .bind(new.created_at)
        .bind(new.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(submission)
    }

    async fn transition_to_submitted(
        &self,
        id: &str,
        score: i32,
        submitted_at: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        let updated = sqlx::query(
            "UPDATE exam_submissions
             SET status = $1, score = $2, submitted_at = $3, updated_at = $3
             WHERE id = $4 AND status = $5",
        )
        .bind(SubmissionStatus::Submitted)
        .bind(score)
        .bind(submitted_at)
        .bind(id)
        .bind(SubmissionStatus::InProgress)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }

    async fn delete_submission(&self, id: &str) -> Result<bool, StoreError> {
        // exam_answers rows go with the submission via ON DELETE CASCADE
        let deleted = sqlx::query("DELETE FROM exam_submissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn upsert_answer(
        &self,
        submission_id: &str,
        question_id: &str,
        answer_text: &str,
        updated_at: PrimitiveDateTime,
    ) -> Result<Answer, StoreError> {
        let answer = sqlx::query_as::<_, Answer>(&format!(
            "INSERT INTO exam_answers (submission_id, question_id, answer_text, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (submission_id, question_id)
             DO UPDATE SET answer_text = EXCLUDED.answer_text,
                           updated_at = EXCLUDED.updated_at
             RETURNING {ANSWER_COLUMNS}"
        ))
        .bind(submission_id)
        .bind(question_id)
        .bind(answer_text)
        .bind(updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(answer)
    }

    async fn list_answers(&self, submission_id: &str) -> Result<Vec<Answer>, StoreError> {
        let answers = sqlx::query_as::<_, Answer>(&format!(
            "SELECT {ANSWER_COLUMNS}
             FROM exam_answers
             WHERE submission_id = $1
             ORDER BY question_id"
        ))
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }

    async fn list_submissions_by_exam(&self, exam_id: &str) -> Result<Vec<Submission>, StoreError> {
        let submissions = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS}
             FROM exam_submissions
             WHERE exam_id = $1
             ORDER BY created_at"
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(submissions)
    }

    async fn list_submissions_by_user(&self, user_id: &str) -> Result<Vec<Submission>, StoreError> {
        let submissions = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS}
             FROM exam_submissions
             WHERE user_id = $1
             ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(submissions)
    }

    async fn list_answers_by_exam(&self, exam_id: &str) -> Result<Vec<Answer>, StoreError> {
        let answers = sqlx::query_as::<_, Answer>(
            "SELECT a.submission_id, a.question_id, a.answer_text, a.updated_at
             FROM exam_answers a
             JOIN exam_submissions s ON s.id = a.submission_id
             WHERE s.exam_id = $1",
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }
}
