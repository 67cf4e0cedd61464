pub(crate) mod auth;
pub(crate) mod branch_tracks;
pub(crate) mod branches;
pub(crate) mod courses;
pub(crate) mod envelope;
pub(crate) mod errors;
pub(crate) mod exams;
pub(crate) mod extract;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod instructor_courses;
pub(crate) mod procedures;
pub(crate) mod questions;
pub(crate) mod router;
pub(crate) mod students;
pub(crate) mod tracks;
pub(crate) mod validation;
