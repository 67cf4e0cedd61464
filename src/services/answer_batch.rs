//! Aggregation for answer batches. Each answer is submitted on its own, so a
//! batch can partially succeed; the per-item results are reported as-is
//! rather than rolled back.

use serde::Serialize;

use crate::db::{GatewayError, ProcedureResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerFailure {
    pub(crate) question_id: i64,
    pub(crate) error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BatchOutcome {
    AllSucceeded { success_count: usize },
    Partial { success_count: usize, errors: Vec<AnswerFailure> },
    AllFailed { errors: Vec<AnswerFailure> },
}

#[derive(Debug, Default)]
pub(crate) struct AnswerBatch {
    success_count: usize,
    errors: Vec<AnswerFailure>,
}

impl AnswerBatch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records one submission. A returned textual status that does not say
    /// "successfully" counts as a failure; an empty result counts as success.
    pub(crate) fn record(
        &mut self,
        question_id: i64,
        result: Result<ProcedureResult, GatewayError>,
    ) {
        let failure = match result {
            Ok(result) => result.first_row().and_then(|row| match row.first_value() {
                Some(serde_json::Value::String(message)) if !message.contains("successfully") => {
                    Some(message.clone())
                }
                _ => None,
            }),
            Err(GatewayError::Procedure { message, .. }) => Some(message),
            Err(err) => Some(err.to_string()),
        };

        match failure {
            Some(error) => self.errors.push(AnswerFailure { question_id, error }),
            None => self.success_count += 1,
        }
    }

    pub(crate) fn finish(self) -> BatchOutcome {
        match (self.success_count, self.errors.is_empty()) {
            (success_count, true) => BatchOutcome::AllSucceeded { success_count },
            (0, false) => BatchOutcome::AllFailed { errors: self.errors },
            (success_count, false) => BatchOutcome::Partial { success_count, errors: self.errors },
        }
    }
}
