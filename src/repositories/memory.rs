use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::PrimitiveDateTime;

use crate::db::models::{Answer, Exam, ExamQuestion, Question, Submission, User};
use crate::db::types::SubmissionStatus;

use super::{ExamStore, NewSubmission, StoreError};

/// In-memory adapter. Backs local development and the test suite; the
/// uniqueness invariant that Postgres enforces with partial indexes is checked
/// here under one write lock, so racing creates still collapse to a conflict.
#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    exams: HashMap<String, Exam>,
    questions: HashMap<String, Question>,
    // exam_id -> attachment rows, ordered by order_index
    exam_questions: HashMap<String, Vec<ExamQuestion>>,
    submissions: HashMap<String, Submission>,
    // (submission_id, question_id) -> answer
    answers: HashMap<(String, String), Answer>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// Fixture seeding. Exams, questions and users are authored by out-of-scope
// subsystems, so only tests ever populate them directly.
#[cfg(test)]
impl MemoryStore {
    pub(crate) fn insert_user(&self, user: User) {
        self.write().users.insert(user.id.clone(), user);
    }

    pub(crate) fn insert_exam(&self, exam: Exam) {
        self.write().exams.insert(exam.id.clone(), exam);
    }

    pub(crate) fn insert_question(&self, question: Question) {
        self.write().questions.insert(question.id.clone(), question);
    }

    pub(crate) fn attach_question(&self, exam_id: &str, question_id: &str) {
        let mut inner = self.write();
        let links = inner.exam_questions.entry(exam_id.to_string()).or_default();
        let order_index = links.len() as i32;
        links.push(ExamQuestion {
            exam_id: exam_id.to_string(),
            question_id: question_id.to_string(),
            order_index,
        });
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_exam(&self, exam_id: &str) -> Result<Option<Exam>, StoreError> {
        Ok(self.read().exams.get(exam_id).cloned())
    }

    async fn list_exam_questions(&self, exam_id: &str) -> Result<Vec<Question>, StoreError> {
        let inner = self.read();
        let mut links = inner.exam_questions.get(exam_id).cloned().unwrap_or_default();
        links.sort_by_key(|link| link.order_index);
        Ok(links
            .iter()
            .filter_map(|link| inner.questions.get(&link.question_id).cloned())
            .collect())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read().users.get(user_id).cloned())
    }

    async fn list_users_by_ids(&self, ids: &[String]) -> Result<Vec<User>, StoreError> {
        let inner = self.read();
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
        Ok(self.read().submissions.get(id).cloned())
    }

    async fn find_latest_submission(
        &self,
        exam_id: &str,
        user_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        let inner = self.read();
        Ok(inner
            .submissions
            .values()
            .filter(|sub| sub.exam_id == exam_id && sub.user_id == user_id)
            .max_by_key(|sub| sub.created_at)
            .cloned())
    }

    async fn create_submission(&self, new: NewSubmission<'_>) -> Result<Submission, StoreError> {
        let mut inner = self.write();

        let duplicate = inner
            .submissions
            .values()
            .any(|sub| sub.exam_id == new.exam_id && sub.user_id == new.user_id);
        if duplicate {
            return Err(StoreError::Conflict);
        }

        let submission = Submission {
            id: new.id.to_string(),
            exam_id: new.exam_id.to_string(),
            user_id: new.user_id.to_string(),
            status: new.status,
            started_at: new.started_at,
            submitted_at: None,
            score: None,
            created_at: new.created_at,
            updated_at: new.updated_at,
        };
        inner.submissions.insert(submission.id.clone(), submission.clone());
        Ok(submission)
    }

    async fn transition_to_submitted(
        &self,
        id: &str,
        score: i32,
        submitted_at: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write();
        let Some(submission) = inner.submissions.get_mut(id) else {
            return Ok(false);
        };
        if submission.status != SubmissionStatus::InProgress {
            return Ok(false);
        }

        submission.status = SubmissionStatus::Submitted;
        submission.score = Some(score);
        submission.submitted_at = Some(submitted_at);
        submission.updated_at = submitted_at;
        Ok(true)
    }

    async fn delete_submission(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.write();
        if inner.submissions.remove(id).is_none() {
            return Ok(false);
        }
        inner.answers.retain(|(submission_id, _), _| submission_id != id);
        Ok(true)
    }

    async fn upsert_answer(
        &self,
        submission_id: &str,
        question_id: &str,
        answer_text: &str,
        updated_at: PrimitiveDateTime,
    ) -> Result<Answer, StoreError> {
        let answer = Answer {
            submission_id: submission_id.to_string(),
            question_id: question_id.to_string(),
            answer_text: answer_text.to_string(),
            updated_at,
        };
        self.write()
            .answers
            .insert((submission_id.to_string(), question_id.to_string()), answer.clone());
        Ok(answer)
    }

    async fn list_answers(&self, submission_id: &str) -> Result<Vec<Answer>, StoreError> {
        let inner = self.read();
        let mut answers: Vec<Answer> = inner
            .answers
            .values()
            .filter(|answer| answer.submission_id == submission_id)
            .cloned()
            .collect();
        answers.sort_by(|a, b| a.question_id.cmp(&b.question_id));
        Ok(answers)
    }

    async fn list_submissions_by_exam(&self, exam_id: &str) -> Result<Vec<Submission>, StoreError> {
        let inner = self.read();
        let mut submissions: Vec<Submission> =
            inner.submissions.values().filter(|sub| sub.exam_id == exam_id).cloned().collect();
        submissions.sort_by_key(|sub| sub.created_at);
        Ok(submissions)
    }

    async fn list_submissions_by_user(&self, user_id: &str) -> Result<Vec<Submission>, StoreError> {
        let inner = self.read();
        let mut submissions: Vec<Submission> =
            inner.submissions.values().filter(|sub| sub.user_id == user_id).cloned().collect();
        submissions.sort_by_key(|sub| sub.created_at);
        Ok(submissions)
    }

    async fn list_answers_by_exam(&self, exam_id: &str) -> Result<Vec<Answer>, StoreError> {
        let inner = self.read();
        let submission_ids: Vec<&String> = inner
            .submissions
            .values()
            .filter(|sub| sub.exam_id == exam_id)
            .map(|sub| &sub.id)
            .collect();
        Ok(inner
            .answers
            .values()
            .filter(|answer| submission_ids.iter().any(|id| **id == answer.submission_id))
            .cloned()
            .collect())
    }
}
