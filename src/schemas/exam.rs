use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::Row;
use crate::schemas::lenient;
use crate::services::answer_batch::AnswerFailure;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateExamRequest {
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) title: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient::text")]
    pub(crate) kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) duration: Option<i32>,
    /// Zero is a valid count; only absence is rejected.
    #[serde(default, deserialize_with = "lenient::int")]
    pub(crate) tf_count: Option<i32>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub(crate) mcq_count: Option<i32>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) exam_grade: Option<i32>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) course_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeneratedExam {
    pub(crate) exam_id: Option<i64>,
    pub(crate) title: String,
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) duration: i32,
    pub(crate) tf_count: i32,
    pub(crate) mcq_count: i32,
    pub(crate) exam_grade: i32,
    pub(crate) course_id: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionGradeRequest {
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) exam_id: Option<i32>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) question_id: Option<i32>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub(crate) question_grade: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionGrade {
    pub(crate) exam_id: i32,
    pub(crate) question_id: i32,
    pub(crate) question_grade: i32,
}

/// `answers` is kept raw so a non-array is reported with the same message
/// as a missing one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitAnswersRequest {
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) exam_id: Option<i32>,
    #[serde(default)]
    pub(crate) answers: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SubmittedAnswer {
    pub(crate) question_id: i32,
    pub(crate) student_answer: String,
}

impl SubmittedAnswer {
    /// Needs a non-zero `questionId` and a non-blank `studentAnswer`.
    pub(crate) fn parse(item: &Value) -> Option<Self> {
        let question_id =
            item.get("questionId").and_then(lenient::int_from_value).filter(|id| *id != 0)?;
        let student_answer = match item.get("studentAnswer")? {
            Value::String(text) if !text.is_empty() => text.clone(),
            Value::Number(number) => number.to_string(),
            _ => return None,
        };
        Some(Self { question_id, student_answer })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionSummary {
    pub(crate) exam_id: i32,
    pub(crate) total_answers: usize,
    pub(crate) success_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) errors: Option<Vec<AnswerFailure>>,
}

/// Body for a batch in which nothing was stored.
#[derive(Debug, Serialize)]
pub(crate) struct SubmissionRejected {
    pub(crate) success: bool,
    pub(crate) message: &'static str,
    pub(crate) errors: Vec<AnswerFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InstructorExam {
    pub(crate) id: Option<i64>,
    pub(crate) title: Option<String>,
    #[serde(rename = "type")]
    pub(crate) kind: Option<String>,
    pub(crate) duration: Option<i64>,
    pub(crate) grade: Option<i64>,
    pub(crate) is_finalized: bool,
    pub(crate) created_at: Option<String>,
    pub(crate) course_name: Option<String>,
    pub(crate) questions_count: Option<i64>,
}

impl InstructorExam {
    pub(crate) fn from_row(row: &Row) -> Self {
        Self {
            id: row.int("exam_id"),
            title: row.text("exam_title"),
            kind: row.text("exam_type"),
            duration: row.int("exam_duration"),
            grade: row.int("exam_grade"),
            is_finalized: row.flag("is_finalized"),
            created_at: row.text("created_at"),
            course_name: row.text("course_name"),
            questions_count: row.int("questions_count"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AvailableExam {
    pub(crate) id: Option<i64>,
    pub(crate) title: Option<String>,
    #[serde(rename = "type")]
    pub(crate) kind: Option<String>,
    pub(crate) duration: Option<i64>,
    pub(crate) grade: Option<i64>,
    pub(crate) created_at: Option<String>,
    pub(crate) created_by: Option<String>,
    pub(crate) course_name: Option<String>,
}

impl AvailableExam {
    pub(crate) fn from_row(row: &Row) -> Self {
        Self {
            id: row.int("exam_id"),
            title: row.text("exam_title"),
            kind: row.text("exam_type"),
            duration: row.int("exam_duration"),
            grade: row.int("exam_grade"),
            created_at: row.text("created_at"),
            created_by: row.text("created_by_name"),
            course_name: row.text("course_name"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TakenExam {
    pub(crate) id: Option<i64>,
    pub(crate) title: Option<String>,
    pub(crate) grade: Option<i64>,
    pub(crate) duration: Option<i64>,
    pub(crate) is_finalized: bool,
    pub(crate) created_by: Option<Value>,
}

impl TakenExam {
    pub(crate) fn from_row(row: &Row) -> Self {
        Self {
            id: row.int("exam_id"),
            title: row.text("exam_title"),
            grade: row.int("exam_grade"),
            duration: row.int("exam_duration"),
            is_finalized: row.flag("is_finalized"),
            created_by: row.get("created_by").cloned(),
        }
    }
}

fn choice(row: &Row, column: &str) -> Option<String> {
    row.text(column).filter(|text| !text.is_empty())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamQuestion {
    pub(crate) question_id: Option<i64>,
    pub(crate) question_text: Option<String>,
    pub(crate) question_type: Option<String>,
    /// Omitted for students.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) question_grade: Option<i64>,
    pub(crate) choice1: Option<String>,
    pub(crate) choice2: Option<String>,
    pub(crate) choice3: Option<String>,
    pub(crate) choice4: Option<String>,
}

impl ExamQuestion {
    pub(crate) fn from_row(row: &Row, with_grade: bool) -> Self {
        Self {
            question_id: row.int("question_id"),
            question_text: row.text("question_text"),
            question_type: row.text("question_type"),
            question_grade: row.int("question_grade").filter(|_| with_grade),
            choice1: choice(row, "choice1"),
            choice2: choice(row, "choice2"),
            choice3: choice(row, "choice3"),
            choice4: choice(row, "choice4"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CorrectedQuestion {
    pub(crate) question_id: Option<i64>,
    pub(crate) question_text: Option<String>,
    pub(crate) question_type: Option<String>,
    pub(crate) choice1: Option<String>,
    pub(crate) choice2: Option<String>,
    pub(crate) choice3: Option<String>,
    pub(crate) choice4: Option<String>,
    pub(crate) correct_answer: Option<String>,
    pub(crate) student_answer: Option<String>,
    pub(crate) result: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Correction {
    pub(crate) final_grade: Option<Value>,
    pub(crate) questions: Vec<CorrectedQuestion>,
}

impl Correction {
    /// One row per question; the final grade repeats and is read from the
    /// first row.
    pub(crate) fn from_rows(rows: &[Row]) -> Option<Self> {
        let first = rows.first()?;
        Some(Self {
            final_grade: first.get("final_grade").cloned(),
            questions: rows
                .iter()
                .map(|row| CorrectedQuestion {
                    question_id: row.int("question_id"),
                    question_text: row.text("question_text"),
                    question_type: row.text("question_type"),
                    choice1: choice(row, "choice1"),
                    choice2: choice(row, "choice2"),
                    choice3: choice(row, "choice3"),
                    choice4: choice(row, "choice4"),
                    correct_answer: row.text("correct_ans"),
                    student_answer: row.text("student_answer"),
                    result: row.get("result").cloned(),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answers_need_question_and_text() {
        assert_eq!(
            SubmittedAnswer::parse(&json!({"questionId": "7", "studentAnswer": "B"})),
            Some(SubmittedAnswer { question_id: 7, student_answer: "B".into() })
        );
        assert!(SubmittedAnswer::parse(&json!({"questionId": 7, "studentAnswer": ""})).is_none());
        assert!(SubmittedAnswer::parse(&json!({"questionId": 0, "studentAnswer": "B"})).is_none());
        assert!(SubmittedAnswer::parse(&json!("B")).is_none());
    }

    #[test]
    fn grade_is_dropped_when_hidden() {
        let row = Row::from(json!({"question_id": 1, "question_grade": 5, "choice1": ""}));
        assert_eq!(ExamQuestion::from_row(&row, true).question_grade, Some(5));
        let hidden = ExamQuestion::from_row(&row, false);
        assert_eq!(hidden.question_grade, None);
        assert_eq!(hidden.choice1, None);
    }
}
