use serde::{Deserialize, Serialize};

use crate::db::Row;
use crate::schemas::lenient;

/// Only two kinds exist; the wire spelling is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) enum QuestionKind {
    #[serde(rename = "MCQ")]
    MultipleChoice,
    #[serde(rename = "TF")]
    TrueFalse,
}

impl QuestionKind {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "MCQ" => Some(Self::MultipleChoice),
            "TF" => Some(Self::TrueFalse),
            _ => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::MultipleChoice => "MCQ",
            Self::TrueFalse => "TF",
        }
    }
}

/// Body of both add and update; `course_id` is ignored on update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionRequest {
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) question_text: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) question_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) correct_answer: Option<String>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) course_id: Option<i32>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) choice1: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) choice2: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) choice3: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) choice4: Option<String>,
}

impl QuestionRequest {
    /// The four choice slots in order, blanks included.
    pub(crate) fn slots(&self) -> [Option<String>; 4] {
        [self.choice1.clone(), self.choice2.clone(), self.choice3.clone(), self.choice4.clone()]
    }

    pub(crate) fn given_choices(&self) -> Vec<String> {
        self.slots().into_iter().flatten().collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionAdded {
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionKind,
    pub(crate) correct_answer: String,
    pub(crate) course_id: i32,
    /// Null for true/false questions.
    pub(crate) choices: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionChange {
    pub(crate) id: i32,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionKind,
    pub(crate) correct_answer: String,
    pub(crate) choices: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChoiceResponse {
    pub(crate) id: Option<i64>,
    pub(crate) text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionDetails {
    pub(crate) id: Option<i64>,
    pub(crate) text: Option<String>,
    #[serde(rename = "type")]
    pub(crate) kind: Option<String>,
    pub(crate) correct_answer: Option<String>,
    pub(crate) course_id: Option<i64>,
    pub(crate) choices: Vec<ChoiceResponse>,
}

impl QuestionDetails {
    /// One row per choice; the question columns repeat on each. Rows without
    /// a choice id (a question with no choices) contribute none.
    pub(crate) fn from_rows(rows: &[Row]) -> Option<Self> {
        let first = rows.first()?;
        Some(Self {
            id: first.int("question_id"),
            text: first.text("question_text"),
            kind: first.text("question_type"),
            correct_answer: first.text("correct_ans"),
            course_id: first.int("course_id"),
            choices: rows
                .iter()
                .filter_map(|row| {
                    row.int("choice_id").filter(|id| *id != 0).map(|id| ChoiceResponse {
                        id: Some(id),
                        text: row.text("choice_text"),
                    })
                })
                .collect(),
        })
    }
}

/// The same question with its choices pivoted into four columns.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionColumns {
    pub(crate) id: Option<i64>,
    pub(crate) text: Option<String>,
    #[serde(rename = "type")]
    pub(crate) kind: Option<String>,
    pub(crate) correct_answer: Option<String>,
    pub(crate) course_id: Option<i64>,
    pub(crate) choice1: Option<String>,
    pub(crate) choice2: Option<String>,
    pub(crate) choice3: Option<String>,
    pub(crate) choice4: Option<String>,
}

impl QuestionColumns {
    pub(crate) fn from_row(row: &Row) -> Self {
        let choice = |column: &str| row.text(column).filter(|text| !text.is_empty());
        Self {
            id: row.int("question_id"),
            text: row.text("question_text"),
            kind: row.text("question_type"),
            correct_answer: row.text("correct_ans"),
            course_id: row.int("course_id"),
            choice1: choice("choice1"),
            choice2: choice("choice2"),
            choice3: choice("choice3"),
            choice4: choice("choice4"),
        }
    }
}
