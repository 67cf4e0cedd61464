use serde::{Deserialize, Serialize};

use crate::db::Row;
use crate::schemas::lenient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentUpdate {
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) email: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) date_of_birth: Option<String>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) track_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnrollmentRequest {
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) student_id: Option<i32>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) course_id: Option<i32>,
}

/// Echo of an accepted update. `date_of_birth` is returned as submitted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentChange {
    pub(crate) id: i32,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) date_of_birth: String,
    pub(crate) track_id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Enrollment {
    pub(crate) student_id: i32,
    pub(crate) course_id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentResponse {
    pub(crate) id: Option<i64>,
    pub(crate) name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) date_of_birth: Option<String>,
    pub(crate) track_name: Option<String>,
}

impl StudentResponse {
    pub(crate) fn from_row(row: &Row) -> Self {
        Self {
            id: row.int("student_id"),
            name: row.text("student_name"),
            email: row.text("student_email"),
            date_of_birth: row.text("date_of_birth"),
            track_name: row.text("tr_name"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnrolledCourse {
    pub(crate) id: Option<i64>,
    pub(crate) name: Option<String>,
    pub(crate) code: Option<String>,
    pub(crate) duration: Option<i64>,
    pub(crate) enroll_date: Option<String>,
}

impl EnrolledCourse {
    pub(crate) fn from_row(row: &Row) -> Self {
        Self {
            id: row.int("course_id"),
            name: row.text("course_name"),
            code: row.text("course_code"),
            duration: row.int("duration"),
            enroll_date: row.text("enroll_date"),
        }
    }
}
