use serde::{Deserialize, Serialize};

use crate::db::Row;
use crate::schemas::lenient;

#[derive(Debug, Deserialize)]
pub(crate) struct CourseRequest {
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) code: Option<String>,
    /// Zero counts as not provided.
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) duration: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseCreated {
    pub(crate) name: String,
    pub(crate) code: String,
    pub(crate) duration: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseChange {
    pub(crate) id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) duration: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseResponse {
    pub(crate) id: Option<i64>,
    pub(crate) name: Option<String>,
    pub(crate) code: Option<String>,
    pub(crate) duration: Option<i64>,
}

impl CourseResponse {
    pub(crate) fn from_row(row: &Row) -> Self {
        Self {
            id: row.int("course_id"),
            name: row.text("course_name"),
            code: row.text("course_code"),
            duration: row.int("duration"),
        }
    }
}
