use std::collections::HashMap;
use std::sync::Arc;

use crate::db::models::{Exam, Question, Submission, User};
use crate::db::types::SubmissionStatus;
use crate::repositories::ExamStore;
use crate::services::{grading, SessionError};

/// Read-only aggregation over stored submissions and answers. Nothing here
/// mutates state; every figure is recomputed from rows on request.
pub(crate) struct ReportService {
    store: Arc<dyn ExamStore>,
}

#[derive(Debug)]
pub(crate) struct ExamReport {
    pub(crate) exam: Exam,
    pub(crate) rows: Vec<ReportRow>,
    pub(crate) statistics: ScoreStatistics,
}

#[derive(Debug)]
pub(crate) struct ReportRow {
    pub(crate) submission: Submission,
    pub(crate) username: String,
    pub(crate) full_name: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub(crate) struct ScoreStatistics {
    pub(crate) total_submissions: i64,
    pub(crate) submitted_count: i64,
    pub(crate) average_score: f64,
    pub(crate) max_score: i32,
    pub(crate) min_score: i32,
    pub(crate) completion_rate: f64,
}

#[derive(Debug)]
pub(crate) struct QuestionStat {
    pub(crate) question: Question,
    pub(crate) total_answers: i64,
    pub(crate) correct_answers: i64,
    pub(crate) correct_rate: f64,
}

#[derive(Debug)]
pub(crate) struct StudentPerformance {
    pub(crate) user: User,
    pub(crate) rows: Vec<PerformanceRow>,
    pub(crate) average_score: f64,
}

#[derive(Debug)]
pub(crate) struct PerformanceRow {
    pub(crate) submission: Submission,
    pub(crate) exam_title: String,
    pub(crate) correct_count: i64,
}

impl ReportService {
    pub(crate) fn new(store: Arc<dyn ExamStore>) -> Self {
        Self { store }
    }

    /// Per-exam roster: every submission with its student's name, plus score
    /// statistics over the graded subset. An exam nobody attempted reports
    /// all-zero statistics rather than failing.
    pub(crate) async fn exam_report(
        &self,
        exam_id: &str,
        caller: &User,
    ) -> Result<ExamReport, SessionError> {
        require_staff(caller)?;

        let exam = self.store.find_exam(exam_id).await?.ok_or(SessionError::ExamNotFound)?;
        let submissions = self.store.list_submissions_by_exam(exam_id).await?;

        let user_ids: Vec<String> = submissions.iter().map(|s| s.user_id.clone()).collect();
        let users: HashMap<String, User> = self
            .store
            .list_users_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let statistics = score_statistics(&submissions);
        let rows = submissions
            .into_iter()
            .map(|submission| {
                let (username, full_name) = users
                    .get(&submission.user_id)
                    .map(|u| (u.username.clone(), u.full_name.clone()))
                    .unwrap_or_default();
                ReportRow { submission, username, full_name }
            })
            .collect();

        Ok(ExamReport { exam, rows, statistics })
    }

    /// Per-question difficulty breakdown across every attempt of the exam,
    /// hardest question first. Essays count as answered but never as correct.
    pub(crate) async fn question_analytics(
        &self,
        exam_id: &str,
        caller: &User,
    ) -> Result<Vec<QuestionStat>, SessionError> {
        require_staff(caller)?;

        self.store.find_exam(exam_id).await?.ok_or(SessionError::ExamNotFound)?;
        let questions = self.store.list_exam_questions(exam_id).await?;
        let answers = self.store.list_answers_by_exam(exam_id).await?;

        let mut totals: HashMap<String, (i64, i64)> = HashMap::new();
        for answer in &answers {
            let Some(question) = questions.iter().find(|q| q.id == answer.question_id) else {
                continue;
            };
            let entry = totals.entry(question.id.clone()).or_default();
            entry.0 += 1;
            if grading::is_correct(question, &answer.answer_text) {
                entry.1 += 1;
            }
        }

        let mut stats: Vec<QuestionStat> = questions
            .into_iter()
            .map(|question| {
                let (total_answers, correct_answers) =
                    totals.get(&question.id).copied().unwrap_or_default();
                let correct_rate = if total_answers > 0 {
                    correct_answers as f64 / total_answers as f64 * 100.0
                } else {
                    0.0
                };
                QuestionStat { question, total_answers, correct_answers, correct_rate }
            })
            .collect();

        stats.sort_by(|a, b| {
            a.correct_rate
                .partial_cmp(&b.correct_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.question.id.cmp(&b.question.id))
        });
        Ok(stats)
    }

    /// A student's history across exams: per-submission correct-answer count
    /// and the overall average of their graded scores. Students may read their
    /// own history; everyone else's requires staff.
    pub(crate) async fn student_performance(
        &self,
        user_id: &str,
        caller: &User,
    ) -> Result<StudentPerformance, SessionError> {
        if caller.id != user_id {
            require_staff(caller)?;
        }

        let user = self.store.find_user(user_id).await?.ok_or(SessionError::UserNotFound)?;
        let submissions = self.store.list_submissions_by_user(user_id).await?;

        let graded: Vec<i32> = submissions.iter().filter_map(|s| s.score).collect();
        let average_score = if graded.is_empty() {
            0.0
        } else {
            graded.iter().map(|s| *s as f64).sum::<f64>() / graded.len() as f64
        };

        let mut rows = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let exam = self.store.find_exam(&submission.exam_id).await?;
            let exam_title = exam.as_ref().map(|e| e.title.clone()).unwrap_or_default();

            let questions = self.store.list_exam_questions(&submission.exam_id).await?;
            let answers = self.store.list_answers(&submission.id).await?;
            let correct_count = answers
                .iter()
                .filter(|answer| {
                    questions
                        .iter()
                        .find(|q| q.id == answer.question_id)
                        .is_some_and(|q| grading::is_correct(q, &answer.answer_text))
                })
                .count() as i64;

            rows.push(PerformanceRow { submission, exam_title, correct_count });
        }

        Ok(StudentPerformance { user, rows, average_score })
    }
}

fn require_staff(caller: &User) -> Result<(), SessionError> {
    if caller.role.is_staff() {
        Ok(())
    } else {
        Err(SessionError::Forbidden)
    }
}

fn score_statistics(submissions: &[Submission]) -> ScoreStatistics {
    let total_submissions = submissions.len() as i64;
    let submitted_count =
        submissions.iter().filter(|s| s.status == SubmissionStatus::Submitted).count() as i64;
    let scores: Vec<i32> = submissions.iter().filter_map(|s| s.score).collect();

    if scores.is_empty() {
        return ScoreStatistics {
            total_submissions,
            submitted_count,
            ..ScoreStatistics::default()
        };
    }

    let sum: i64 = scores.iter().map(|s| *s as i64).sum();
    ScoreStatistics {
        total_submissions,
        submitted_count,
        average_score: sum as f64 / scores.len() as f64,
        max_score: scores.iter().copied().max().unwrap_or(0),
        min_score: scores.iter().copied().min().unwrap_or(0),
        completion_rate: if total_submissions > 0 {
            submitted_count as f64 / total_submissions as f64 * 100.0
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::QuestionType;
    use crate::repositories::MemoryStore;
    use crate::services::session::SessionService;
    use crate::test_support::{self, ManualClock};
    use time::macros::datetime;
    use time::Duration;

    const T0: time::PrimitiveDateTime = datetime!(2025-03-01 10:00:00);

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        sessions: SessionService,
        reports: ReportService,
        teacher: User,
        exam_id: String,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));

        let teacher = test_support::teacher("teacher-1");
        store.insert_user(teacher.clone());

        let exam = test_support::exam(
            "exam-1",
            30,
            T0 - Duration::hours(1),
            T0 + Duration::hours(1),
        );
        let exam_id = exam.id.clone();
        store.insert_exam(exam);

        store.insert_question(test_support::question("q1", QuestionType::MultipleChoice, "A", 10));
        store.insert_question(test_support::question("q2", QuestionType::TrueFalse, "true", 5));
        store.insert_question(test_support::question("q3", QuestionType::Essay, "", 20));
        for id in ["q1", "q2", "q3"] {
            store.attach_question(&exam_id, id);
        }

        let sessions = SessionService::new(store.clone(), clock.clone(), 0);
        let reports = ReportService::new(store.clone());
        Fixture { store, clock, sessions, reports, teacher, exam_id }
    }

    async fn take_exam(fx: &Fixture, user_id: &str, answers: &[(&str, &str)], submit: bool) {
        let student = test_support::student(user_id);
        fx.store.insert_user(student.clone());
        let started = fx.sessions.start_exam(&fx.exam_id, &student).await.expect("start");
        for (question_id, text) in answers {
            fx.sessions
                .save_answer(&started.submission.id, question_id, text, &student)
                .await
                .expect("save");
        }
        if submit {
            fx.sessions.submit_exam(&started.submission.id, &student).await.expect("submit");
        }
    }

    #[tokio::test]
    async fn empty_exam_reports_all_zero_statistics() {
        let fx = fixture();

        let report = fx.reports.exam_report(&fx.exam_id, &fx.teacher).await.expect("report");
        assert!(report.rows.is_empty());
        assert_eq!(report.statistics, ScoreStatistics::default());
    }

    #[tokio::test]
    async fn report_aggregates_scores_and_completion() {
        let fx = fixture();
        take_exam(&fx, "s1", &[("q1", "A"), ("q2", "true")], true).await; // 15
        take_exam(&fx, "s2", &[("q1", "B")], true).await; // 0
        take_exam(&fx, "s3", &[("q1", "A")], false).await; // in progress

        let report = fx.reports.exam_report(&fx.exam_id, &fx.teacher).await.expect("report");
        assert_eq!(report.rows.len(), 3);
        assert!(report.rows.iter().any(|r| r.username == "s1"));

        let stats = report.statistics;
        assert_eq!(stats.total_submissions, 3);
        assert_eq!(stats.submitted_count, 2);
        assert_eq!(stats.average_score, 7.5);
        assert_eq!(stats.max_score, 15);
        assert_eq!(stats.min_score, 0);
        assert!((stats.completion_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn report_requires_staff() {
        let fx = fixture();
        let student = test_support::student("s1");
        fx.store.insert_user(student.clone());

        let err = fx.reports.exam_report(&fx.exam_id, &student).await.unwrap_err();
        assert!(matches!(err, SessionError::Forbidden));
    }

    #[tokio::test]
    async fn analytics_sorts_hardest_question_first() {
        let fx = fixture();
        take_exam(&fx, "s1", &[("q1", "A"), ("q2", "false"), ("q3", "essay text")], true).await;
        take_exam(&fx, "s2", &[("q1", "A"), ("q2", "true")], true).await;

        let stats =
            fx.reports.question_analytics(&fx.exam_id, &fx.teacher).await.expect("analytics");
        assert_eq!(stats.len(), 3);

        // q3 (essay, never correct: 0%), then q2 (50%), then q1 (100%)
        assert_eq!(stats[0].question.id, "q3");
        assert_eq!(stats[0].total_answers, 1);
        assert_eq!(stats[0].correct_answers, 0);
        assert_eq!(stats[1].question.id, "q2");
        assert_eq!(stats[1].correct_rate, 50.0);
        assert_eq!(stats[2].question.id, "q1");
        assert_eq!(stats[2].correct_rate, 100.0);
    }

    #[tokio::test]
    async fn analytics_includes_unanswered_questions_at_zero() {
        let fx = fixture();
        take_exam(&fx, "s1", &[("q1", "A")], true).await;

        let stats =
            fx.reports.question_analytics(&fx.exam_id, &fx.teacher).await.expect("analytics");
        let q2 = stats.iter().find(|s| s.question.id == "q2").expect("q2");
        assert_eq!(q2.total_answers, 0);
        assert_eq!(q2.correct_rate, 0.0);
    }

    #[tokio::test]
    async fn performance_averages_graded_scores_only() {
        let fx = fixture();
        take_exam(&fx, "s1", &[("q1", "A"), ("q2", "true")], true).await;

        // a second exam the same student leaves unfinished
        let exam2 = test_support::exam(
            "exam-2",
            30,
            T0 - Duration::hours(1),
            T0 + Duration::hours(1),
        );
        fx.store.insert_exam(exam2);
        fx.store.attach_question("exam-2", "q1");
        let student = fx.store.find_user("s1").await.expect("fetch").expect("s1");
        fx.sessions.start_exam("exam-2", &student).await.expect("start second");

        let perf =
            fx.reports.student_performance("s1", &fx.teacher).await.expect("performance");
        assert_eq!(perf.rows.len(), 2);
        assert_eq!(perf.average_score, 15.0);

        let graded = perf.rows.iter().find(|r| r.submission.exam_id == fx.exam_id).expect("row");
        assert_eq!(graded.correct_count, 2);
        assert_eq!(graded.exam_title, "Algorithms Midterm");
    }

    #[tokio::test]
    async fn student_reads_own_performance_but_not_others() {
        let fx = fixture();
        take_exam(&fx, "s1", &[("q1", "A")], true).await;
        let s1 = fx.store.find_user("s1").await.expect("fetch").expect("s1");
        let s2 = test_support::student("s2");
        fx.store.insert_user(s2.clone());

        fx.reports.student_performance("s1", &s1).await.expect("own history");
        let err = fx.reports.student_performance("s1", &s2).await.unwrap_err();
        assert!(matches!(err, SessionError::Forbidden));
    }

    #[tokio::test]
    async fn clock_is_unused_after_fixture_setup() {
        // Reporting never consults the clock; aggregation is pure row math.
        let fx = fixture();
        take_exam(&fx, "s1", &[("q1", "A")], true).await;
        fx.clock.advance(Duration::days(30));

        let report = fx.reports.exam_report(&fx.exam_id, &fx.teacher).await.expect("report");
        assert_eq!(report.statistics.max_score, 10);
        let _ = fx.clock.now();
    }
}
