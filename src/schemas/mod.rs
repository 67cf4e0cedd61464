use serde::Serialize;

pub(crate) mod auth;
pub(crate) mod branch;
pub(crate) mod branch_track;
pub(crate) mod course;
pub(crate) mod exam;
pub(crate) mod instructor_course;
pub(crate) mod lenient;
pub(crate) mod question;
pub(crate) mod student;
pub(crate) mod track;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) success: bool,
    pub(crate) message: &'static str,
    pub(crate) timestamp: String,
    pub(crate) database: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) success: bool,
    pub(crate) message: &'static str,
    pub(crate) version: &'static str,
    pub(crate) environment: &'static str,
}

/// Body for requests that match no route.
#[derive(Debug, Serialize)]
pub(crate) struct RouteNotFound {
    pub(crate) success: bool,
    pub(crate) message: &'static str,
    pub(crate) path: String,
}
