pub(crate) mod grading;
pub(crate) mod reporting;
pub(crate) mod session;
pub(crate) mod timing;

use thiserror::Error;

use crate::repositories::StoreError;

/// Failure taxonomy shared by the lifecycle and reporting services. Every
/// variant maps to a stable machine-readable code at the API boundary.
#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("Exam not found")]
    ExamNotFound,
    #[error("Submission not found")]
    SubmissionNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Access denied")]
    Forbidden,
    #[error("Exam has not started yet")]
    WindowNotOpen,
    #[error("Exam has ended")]
    WindowClosed,
    #[error("Exam already submitted")]
    AlreadySubmitted,
    #[error("Exam time has expired")]
    TimeExpired,
    #[error(transparent)]
    Store(#[from] StoreError),
}
