use std::collections::HashMap;

use crate::db::models::{Answer, Question};
use crate::db::types::QuestionType;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GradeSummary {
    pub(crate) score: i32,
    pub(crate) correct_count: i32,
    pub(crate) graded_count: i32,
    pub(crate) total_answered: i32,
}

/// The comparison rule for objective answers: trim whitespace, fold case.
/// Deliberately nothing more; the stored option labels are the contract.
pub(crate) fn normalize_answer(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub(crate) fn is_correct(question: &Question, answer_text: &str) -> bool {
    question.question_type.is_objective()
        && normalize_answer(answer_text) == normalize_answer(&question.correct_answer)
}

/// Deterministic submit-time grading. Objective answers are compared against
/// the catalog; essays are counted as answered but never auto-graded; answers
/// pointing at questions absent from the catalog are skipped, not fatal.
pub(crate) fn grade_answers(
    answers: &[Answer],
    catalog: &HashMap<String, Question>,
) -> GradeSummary {
    let mut summary = GradeSummary::default();

    for answer in answers {
        summary.total_answered += 1;

        let Some(question) = catalog.get(&answer.question_id) else {
            tracing::warn!(
                question_id = %answer.question_id,
                submission_id = %answer.submission_id,
                "answer references a question missing from the catalog; skipping"
            );
            continue;
        };

        match question.question_type {
            QuestionType::Essay => {}
            QuestionType::MultipleChoice | QuestionType::TrueFalse => {
                summary.graded_count += 1;
                if is_correct(question, &answer.answer_text) {
                    summary.score += question.points;
                    summary.correct_count += 1;
                }
            }
        }
    }

    summary
}
