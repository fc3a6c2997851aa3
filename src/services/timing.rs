use time::PrimitiveDateTime;

use crate::db::models::Exam;

/// Where "now" falls relative to the exam's legal attempt window. Both bounds
/// are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExamWindow {
    NotYetOpen,
    Open,
    Closed,
}

pub(crate) fn classify_window(exam: &Exam, now: PrimitiveDateTime) -> ExamWindow {
    if now < exam.start_time {
        ExamWindow::NotYetOpen
    } else if now > exam.end_time {
        ExamWindow::Closed
    } else {
        ExamWindow::Open
    }
}

pub(crate) fn duration_budget_seconds(exam: &Exam) -> i64 {
    exam.duration_minutes as i64 * 60
}

/// Remaining budget on resume, floored to whole seconds and clamped at zero.
/// Always derived from started_at, never stored.
pub(crate) fn remaining_seconds(
    exam: &Exam,
    started_at: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> i64 {
    let elapsed = (now - started_at).whole_seconds();
    (duration_budget_seconds(exam) - elapsed).max(0)
}

/// True once the attempt's time budget (plus any configured grace) is spent.
pub(crate) fn budget_expired(
    exam: &Exam,
    started_at: PrimitiveDateTime,
    now: PrimitiveDateTime,
    grace_seconds: i64,
) -> bool {
    let elapsed = (now - started_at).whole_seconds();
    elapsed >= duration_budget_seconds(exam) + grace_seconds
}
