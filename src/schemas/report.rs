use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::Exam;
use crate::db::types::{QuestionType, SubmissionStatus};
use crate::services::reporting::{
    ExamReport, PerformanceRow, QuestionStat, ReportRow, ScoreStatistics, StudentPerformance,
};

#[derive(Debug, Serialize)]
pub(crate) struct ExamSummaryResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
}

impl ExamSummaryResponse {
    fn from_model(exam: &Exam) -> Self {
        Self {
            id: exam.id.clone(),
            title: exam.title.clone(),
            duration_minutes: exam.duration_minutes,
            start_time: format_primitive(exam.start_time),
            end_time: format_primitive(exam.end_time),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ReportSubmissionResponse {
    pub(crate) submission_id: String,
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) score: Option<i32>,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
}

impl ReportSubmissionResponse {
    fn from_row(row: &ReportRow) -> Self {
        Self {
            submission_id: row.submission.id.clone(),
            user_id: row.submission.user_id.clone(),
            username: row.username.clone(),
            full_name: row.full_name.clone(),
            status: row.submission.status,
            score: row.submission.score,
            started_at: format_primitive(row.submission.started_at),
            submitted_at: row.submission.submitted_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoreStatisticsResponse {
    pub(crate) total_submissions: i64,
    pub(crate) submitted_count: i64,
    pub(crate) average_score: f64,
    pub(crate) max_score: i32,
    pub(crate) min_score: i32,
    pub(crate) completion_rate: f64,
}

impl ScoreStatisticsResponse {
    fn from_stats(stats: &ScoreStatistics) -> Self {
        Self {
            total_submissions: stats.total_submissions,
            submitted_count: stats.submitted_count,
            average_score: stats.average_score,
            max_score: stats.max_score,
            min_score: stats.min_score,
            completion_rate: stats.completion_rate,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamReportResponse {
    pub(crate) exam: ExamSummaryResponse,
    pub(crate) submissions: Vec<ReportSubmissionResponse>,
    pub(crate) statistics: ScoreStatisticsResponse,
}

impl ExamReportResponse {
    pub(crate) fn from_report(report: &ExamReport) -> Self {
        Self {
            exam: ExamSummaryResponse::from_model(&report.exam),
            submissions: report.rows.iter().map(ReportSubmissionResponse::from_row).collect(),
            statistics: ScoreStatisticsResponse::from_stats(&report.statistics),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionAnalyticsResponse {
    pub(crate) question_id: String,
    pub(crate) text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) total_answers: i64,
    pub(crate) correct_answers: i64,
    pub(crate) correct_rate: f64,
}

impl QuestionAnalyticsResponse {
    pub(crate) fn from_stat(stat: &QuestionStat) -> Self {
        Self {
            question_id: stat.question.id.clone(),
            text: stat.question.text.clone(),
            question_type: stat.question.question_type,
            total_answers: stat.total_answers,
            correct_answers: stat.correct_answers,
            correct_rate: stat.correct_rate,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PerformanceSubmissionResponse {
    pub(crate) submission_id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) score: Option<i32>,
    pub(crate) correct_count: i64,
    pub(crate) submitted_at: Option<String>,
}

impl PerformanceSubmissionResponse {
    fn from_row(row: &PerformanceRow) -> Self {
        Self {
            submission_id: row.submission.id.clone(),
            exam_id: row.submission.exam_id.clone(),
            exam_title: row.exam_title.clone(),
            status: row.submission.status,
            score: row.submission.score,
            correct_count: row.correct_count,
            submitted_at: row.submission.submitted_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentPerformanceResponse {
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) average_score: f64,
    pub(crate) submissions: Vec<PerformanceSubmissionResponse>,
}

impl StudentPerformanceResponse {
    pub(crate) fn from_performance(perf: &StudentPerformance) -> Self {
        Self {
            user_id: perf.user.id.clone(),
            username: perf.user.username.clone(),
            full_name: perf.user.full_name.clone(),
            average_score: perf.average_score,
            submissions: perf.rows.iter().map(PerformanceSubmissionResponse::from_row).collect(),
        }
    }
}
