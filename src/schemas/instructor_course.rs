use serde::{Deserialize, Serialize};

use crate::db::Row;
use crate::schemas::lenient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseAssignmentRequest {
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) instructor_id: Option<i32>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) course_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrackAssignmentRequest {
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) instructor_id: Option<i32>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) track_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TopicRequest {
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) course_id: Option<i32>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) topic_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseAssignment {
    pub(crate) instructor_id: i32,
    pub(crate) course_id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrackAssignment {
    pub(crate) instructor_id: i32,
    pub(crate) track_id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TopicAdded {
    pub(crate) course_id: i32,
    pub(crate) topic_name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct InstructorRef {
    pub(crate) id: Option<i64>,
    pub(crate) name: Option<String>,
    pub(crate) email: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseDetails {
    pub(crate) id: Option<i64>,
    pub(crate) name: Option<String>,
    pub(crate) code: Option<String>,
    pub(crate) duration: Option<i64>,
    pub(crate) instructor: InstructorRef,
    pub(crate) topics: Vec<serde_json::Value>,
}

impl CourseDetails {
    /// Course row from the first result set, topic rows from the second.
    pub(crate) fn from_rows(course: &Row, topics: &[Row]) -> Self {
        Self {
            id: course.int("course_id"),
            name: course.text("course_name"),
            code: course.text("course_code"),
            duration: course.int("duration"),
            instructor: InstructorRef {
                id: course.int("instructor_id"),
                name: course.text("instructor_name"),
                email: course.text("instructor_email"),
            },
            topics: topics
                .iter()
                .map(|topic| topic.get("topic_name").cloned().unwrap_or_default())
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseWithTopics {
    pub(crate) id: Option<i64>,
    pub(crate) name: Option<String>,
    pub(crate) code: Option<String>,
    pub(crate) duration: Option<i64>,
    pub(crate) topics: Vec<String>,
}

impl CourseWithTopics {
    /// Folds one row per (course, topic) into one entry per course, in the
    /// order courses first appear. Rows without a topic add none.
    pub(crate) fn group(rows: &[Row]) -> Vec<Self> {
        let mut courses: Vec<Self> = Vec::new();
        for row in rows {
            let id = row.int("course_id");
            let position = match courses.iter().position(|course| course.id == id) {
                Some(position) => position,
                None => {
                    courses.push(Self {
                        id,
                        name: row.text("course_name"),
                        code: row.text("course_code"),
                        duration: row.int("duration"),
                        topics: Vec::new(),
                    });
                    courses.len() - 1
                }
            };
            if let Some(topic) = row.text("topic_name").filter(|topic| !topic.is_empty()) {
                courses[position].topics.push(topic);
            }
        }
        courses
    }
}
