pub(crate) mod errors;
pub(crate) mod exams;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod reports;
pub(crate) mod router;
pub(crate) mod submissions;
