//! Glue between handlers and the procedure gateway: runs a call and turns
//! gateway failures and status rows into API errors.

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::{GatewayError, ProcedureCall, ProcedureResult, Row};
use crate::services::outcome::{self, Outcome};

/// Per-endpoint wording used when a call fails.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallContext {
    failure: &'static str,
    not_found: Option<&'static str>,
    conflict: Option<&'static str>,
}

impl CallContext {
    pub(crate) const fn new(failure: &'static str) -> Self {
        Self { failure, not_found: None, conflict: None }
    }

    pub(crate) const fn not_found(mut self, message: &'static str) -> Self {
        self.not_found = Some(message);
        self
    }

    pub(crate) const fn conflict(mut self, message: &'static str) -> Self {
        self.conflict = Some(message);
        self
    }

    pub(crate) fn failure(&self) -> &'static str {
        self.failure
    }

    fn not_found_message(&self, reported: &str) -> String {
        self.not_found.map_or_else(|| reported.to_string(), str::to_string)
    }

    fn conflict_message(&self, reported: &str) -> String {
        self.conflict.map_or_else(|| reported.to_string(), str::to_string)
    }
}

pub(crate) async fn call(
    state: &AppState,
    call: ProcedureCall,
    ctx: CallContext,
) -> Result<ProcedureResult, ApiError> {
    state.gateway().execute(call).await.map_err(|err| gateway_failure(err, ctx))
}

pub(crate) fn gateway_failure(err: GatewayError, ctx: CallContext) -> ApiError {
    match &err {
        GatewayError::ValueTooLong { param, max } => {
            ApiError::bad_request(format!("{param} must be at most {max} characters"))
        }
        GatewayError::Connection(_) | GatewayError::Timeout(_) => ApiError::ServiceUnavailable {
            message: "Database unavailable".to_string(),
            detail: Some(err.to_string()),
        },
        GatewayError::Procedure { message, code, .. } => {
            match outcome::classify_raised(message, code.as_deref()) {
                Outcome::Conflict => ApiError::bad_request(ctx.conflict_message(message)),
                Outcome::NotFound => ApiError::not_found(ctx.not_found_message(message)),
                _ => ApiError::internal(&err, ctx.failure),
            }
        }
        GatewayError::InvalidCall(_) | GatewayError::Driver(_) => {
            ApiError::internal(&err, ctx.failure)
        }
    }
}

/// First row of the primary result set; a routine that answers with nothing
/// where a status row was expected is a server fault.
pub(crate) fn require_row(result: &ProcedureResult) -> Result<&Row, ApiError> {
    result.first_row().ok_or_else(|| ApiError::Internal {
        message: "No response from database".to_string(),
        detail: None,
    })
}

/// Checks the `message` column of a status row. Missing entities, conflicts
/// and failures become errors; anything else, including a row without a
/// message, is accepted.
pub(crate) fn ensure_accepted(row: &Row, ctx: CallContext) -> Result<(), ApiError> {
    let Some(message) = row.text("message") else {
        return Ok(());
    };

    match outcome::classify(&message) {
        Outcome::NotFound => Err(ApiError::not_found(ctx.not_found_message(&message))),
        Outcome::Conflict => Err(ApiError::bad_request(ctx.conflict_message(&message))),
        Outcome::Failed => {
            Err(ApiError::bad_request(row.text("errormessage").unwrap_or(message)))
        }
        Outcome::Succeeded | Outcome::Unclassified => Ok(()),
    }
}

/// [`ensure_accepted`] over the first row, for routines that may answer
/// with no rows at all.
pub(crate) fn ensure_status(result: &ProcedureResult, ctx: CallContext) -> Result<(), ApiError> {
    match result.first_row() {
        Some(row) => ensure_accepted(row, ctx),
        None => Ok(()),
    }
}

/// Status text of a row: the named column if present, else the leftmost
/// column when it holds text.
pub(crate) fn status_message(row: &Row, column: &str) -> Option<String> {
    row.text(column)
        .or_else(|| row.first_value().and_then(|value| value.as_str()).map(str::to_string))
}

/// Some routines refuse by answering `result = -1` with a `message`.
pub(crate) fn refusal(result: &ProcedureResult) -> Option<String> {
    let row = result.first_row()?;
    (row.int("result") == Some(-1)).then(|| row.text("message").unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    const CTX: CallContext = CallContext::new("An error occurred while updating branch")
        .not_found("Branch not found");

    fn raised(message: &str, code: Option<&str>) -> GatewayError {
        GatewayError::Procedure {
            procedure: "sp_update_branch".into(),
            message: message.into(),
            code: code.map(str::to_string),
        }
    }

    #[test]
    fn raised_errors_are_classified() {
        let err = gateway_failure(raised("Branch ID does not exist", None), CTX);
        assert!(matches!(err, ApiError::NotFound(ref message) if message == "Branch not found"));

        let err = gateway_failure(raised("whatever", Some("23505")), CTX);
        assert!(matches!(err, ApiError::BadRequest(ref message) if message == "whatever"));

        let err = gateway_failure(raised("division by zero", Some("22012")), CTX);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn connection_failures_are_unavailable() {
        let err = gateway_failure(GatewayError::Connection(sqlx::Error::PoolTimedOut), CTX);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = gateway_failure(
            GatewayError::Timeout(std::time::Duration::from_secs(30)),
            CTX,
        );
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn oversize_values_are_client_errors() {
        let err = gateway_failure(
            GatewayError::ValueTooLong { param: "br_name".into(), max: 100 },
            CTX,
        );
        assert!(
            matches!(err, ApiError::BadRequest(ref message) if message == "br_name must be at most 100 characters")
        );
    }

    #[test]
    fn status_rows_are_checked() {
        let ok = Row::from(json!({"message": "Branch updated successfully"}));
        assert!(ensure_accepted(&ok, CTX).is_ok());
        assert!(ensure_accepted(&Row::from(json!({"br_id": 1})), CTX).is_ok());

        let missing = Row::from(json!({"message": "Branch does not exist"}));
        assert_eq!(ensure_accepted(&missing, CTX).unwrap_err().status(), StatusCode::NOT_FOUND);

        let failed = Row::from(json!({"message": "Error", "ErrorMessage": "FK violation"}));
        assert!(matches!(
            ensure_accepted(&failed, CTX),
            Err(ApiError::BadRequest(ref message)) if message == "FK violation"
        ));
    }

    #[test]
    fn status_text_falls_back_to_leftmost_column() {
        let named = Row::from(json!({"Exam_ID": 3, "Result": "Exam generated successfully"}));
        assert_eq!(status_message(&named, "result").as_deref(), Some("Exam generated successfully"));

        let bare = Row::from(json!({"": "Not enough MCQ questions"}));
        assert_eq!(status_message(&bare, "result").as_deref(), Some("Not enough MCQ questions"));

        let numeric = Row::from(json!({"exam_id": 3}));
        assert_eq!(status_message(&numeric, "result"), None);
    }
}
