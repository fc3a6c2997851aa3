use std::collections::HashMap;
use std::sync::Arc;

use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::time::Clock;
use crate::db::models::{Answer, Exam, Question, Submission, User};
use crate::db::types::SubmissionStatus;
use crate::repositories::{ExamStore, NewSubmission, StoreError};
use crate::services::{grading, timing, SessionError};

/// The session lifecycle manager: decides whether an attempt can be started
/// or resumed, accepts answer upserts, and performs submit-time grading. All
/// storage goes through the injected `ExamStore`; all time through the
/// injected `Clock`.
pub(crate) struct SessionService {
    store: Arc<dyn ExamStore>,
    clock: Arc<dyn Clock>,
    save_grace_seconds: i64,
}

#[derive(Debug)]
pub(crate) struct StartedExam {
    pub(crate) submission: Submission,
    pub(crate) remaining_seconds: i64,
    pub(crate) resumed: bool,
    pub(crate) answers: Vec<Answer>,
}

#[derive(Debug)]
pub(crate) struct SubmittedExam {
    pub(crate) submission: Submission,
    pub(crate) summary: grading::GradeSummary,
}

#[derive(Debug)]
pub(crate) struct SubmissionDetail {
    pub(crate) submission: Submission,
    pub(crate) answers: Vec<AnswerWithQuestion>,
}

/// An answer joined with its catalog context for review rendering. The
/// question is optional because answers may outlive catalog entries.
#[derive(Debug)]
pub(crate) struct AnswerWithQuestion {
    pub(crate) answer: Answer,
    pub(crate) question: Option<Question>,
}

impl SessionService {
    pub(crate) fn new(
        store: Arc<dyn ExamStore>,
        clock: Arc<dyn Clock>,
        save_grace_seconds: u64,
    ) -> Self {
        Self { store, clock, save_grace_seconds: save_grace_seconds as i64 }
    }

    /// Start a fresh attempt or resume the caller's in-progress one. At most
    /// one submission row is ever created per (exam, user); a concurrent
    /// duplicate create is resolved by re-reading the row that won.
    pub(crate) async fn start_exam(
        &self,
        exam_id: &str,
        caller: &User,
    ) -> Result<StartedExam, SessionError> {
        let exam = self.fetch_exam(exam_id).await?;
        let now = self.clock.now();

        match timing::classify_window(&exam, now) {
            timing::ExamWindow::NotYetOpen => return Err(SessionError::WindowNotOpen),
            timing::ExamWindow::Closed => return Err(SessionError::WindowClosed),
            timing::ExamWindow::Open => {}
        }

        if let Some(existing) =
            self.store.find_latest_submission(exam_id, &caller.id).await?
        {
            return self.resume(&exam, existing, now).await;
        }

        let submission_id = Uuid::new_v4().to_string();
        let created = self
            .store
            .create_submission(NewSubmission {
                id: &submission_id,
                exam_id,
                user_id: &caller.id,
                status: SubmissionStatus::InProgress,
                started_at: now,
                created_at: now,
                updated_at: now,
            })
            .await;

        match created {
            Ok(submission) => {
                metrics::counter!("exam_sessions_started_total").increment(1);
                tracing::info!(exam_id, user_id = %caller.id, submission_id = %submission.id, "exam attempt started");
                Ok(StartedExam {
                    remaining_seconds: timing::duration_budget_seconds(&exam),
                    submission,
                    resumed: false,
                    answers: Vec::new(),
                })
            }
            Err(StoreError::Conflict) => {
                // Lost the create race; the winner's row is authoritative.
                let existing = self
                    .store
                    .find_latest_submission(exam_id, &caller.id)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Backend("submission missing after create conflict".to_string())
                    })?;
                self.resume(&exam, existing, now).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn resume(
        &self,
        exam: &Exam,
        submission: Submission,
        now: PrimitiveDateTime,
    ) -> Result<StartedExam, SessionError> {
        if submission.status == SubmissionStatus::Submitted {
            return Err(SessionError::AlreadySubmitted);
        }

        let remaining_seconds = timing::remaining_seconds(exam, submission.started_at, now);
        let answers = self.store.list_answers(&submission.id).await?;

        metrics::counter!("exam_sessions_resumed_total").increment(1);
        tracing::info!(
            submission_id = %submission.id,
            remaining_seconds,
            answer_count = answers.len(),
            "exam attempt resumed"
        );

        Ok(StartedExam { submission, remaining_seconds, resumed: true, answers })
    }

    /// Upsert one answer. Repeated saves for the same question are idempotent
    /// per value; an empty string is stored as an explicit "cleared" answer.
    pub(crate) async fn save_answer(
        &self,
        submission_id: &str,
        question_id: &str,
        answer_text: &str,
        caller: &User,
    ) -> Result<Answer, SessionError> {
        let submission = self.fetch_owned_submission(submission_id, caller).await?;
        if submission.status == SubmissionStatus::Submitted {
            return Err(SessionError::AlreadySubmitted);
        }

        let exam = self.fetch_exam(&submission.exam_id).await?;
        let now = self.clock.now();
        if timing::budget_expired(&exam, submission.started_at, now, self.save_grace_seconds) {
            return Err(SessionError::TimeExpired);
        }

        let answer =
            self.store.upsert_answer(&submission.id, question_id, answer_text, now).await?;
        Ok(answer)
    }

    /// Grade and close the attempt. The status transition is a guarded
    /// conditional update, so a double submit (user click racing the client
    /// auto-submit timer) grades exactly once.
    pub(crate) async fn submit_exam(
        &self,
        submission_id: &str,
        caller: &User,
    ) -> Result<SubmittedExam, SessionError> {
        let submission = self.fetch_owned_submission(submission_id, caller).await?;
        if submission.status == SubmissionStatus::Submitted {
            return Err(SessionError::AlreadySubmitted);
        }

        let answers = self.store.list_answers(&submission.id).await?;
        let catalog = self.question_catalog(&submission.exam_id).await?;
        let summary = grading::grade_answers(&answers, &catalog);

        let now = self.clock.now();
        let transitioned =
            self.store.transition_to_submitted(&submission.id, summary.score, now).await?;
        if !transitioned {
            return Err(SessionError::AlreadySubmitted);
        }

        let submission = self
            .store
            .find_submission(&submission.id)
            .await?
            .ok_or(SessionError::SubmissionNotFound)?;

        metrics::counter!("exam_submissions_graded_total").increment(1);
        tracing::info!(
            submission_id = %submission.id,
            score = summary.score,
            correct = summary.correct_count,
            graded = summary.graded_count,
            "exam attempt submitted and graded"
        );

        Ok(SubmittedExam { submission, summary })
    }

    /// Read-only review projection: every answer joined with its question's
    /// text/type/options/correct answer/points. Owner or staff only.
    pub(crate) async fn submission_detail(
        &self,
        submission_id: &str,
        caller: &User,
    ) -> Result<SubmissionDetail, SessionError> {
        let submission = self
            .store
            .find_submission(submission_id)
            .await?
            .ok_or(SessionError::SubmissionNotFound)?;

        if submission.user_id != caller.id && !caller.role.is_staff() {
            return Err(SessionError::Forbidden);
        }

        let answers = self.store.list_answers(&submission.id).await?;
        let catalog = self.question_catalog(&submission.exam_id).await?;

        let answers = answers
            .into_iter()
            .map(|answer| {
                let question = catalog.get(&answer.question_id).cloned();
                AnswerWithQuestion { answer, question }
            })
            .collect();

        Ok(SubmissionDetail { submission, answers })
    }

    /// Privileged reset: deletes the submission and its answers, reopening the
    /// (exam, user) pair.
    pub(crate) async fn reset_submission(
        &self,
        submission_id: &str,
        caller: &User,
    ) -> Result<(), SessionError> {
        if !caller.role.is_staff() {
            return Err(SessionError::Forbidden);
        }

        let deleted = self.store.delete_submission(submission_id).await?;
        if !deleted {
            return Err(SessionError::SubmissionNotFound);
        }

        tracing::info!(submission_id, reset_by = %caller.id, "submission reset");
        Ok(())
    }

    async fn fetch_exam(&self, exam_id: &str) -> Result<Exam, SessionError> {
        self.store.find_exam(exam_id).await?.ok_or(SessionError::ExamNotFound)
    }

    /// Ownership check for write paths. Absence and foreign ownership are the
    /// same answer so existence is never leaked to other students.
    async fn fetch_owned_submission(
        &self,
        submission_id: &str,
        caller: &User,
    ) -> Result<Submission, SessionError> {
        let submission = self
            .store
            .find_submission(submission_id)
            .await?
            .ok_or(SessionError::SubmissionNotFound)?;

        if submission.user_id != caller.id {
            return Err(SessionError::SubmissionNotFound);
        }

        Ok(submission)
    }

    async fn question_catalog(
        &self,
        exam_id: &str,
    ) -> Result<HashMap<String, Question>, SessionError> {
        let questions = self.store.list_exam_questions(exam_id).await?;
        Ok(questions.into_iter().map(|q| (q.id.clone(), q)).collect())
    }
}
