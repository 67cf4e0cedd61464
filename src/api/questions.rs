use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::envelope::Envelope;
use crate::api::errors::ApiError;
use crate::api::extract::{JsonBody, PathParams};
use crate::api::guards::{authorize, INSTRUCTOR_ONLY};
use crate::api::procedures::{self, CallContext};
use crate::core::state::AppState;
use crate::db::{ProcedureCall, SqlType};
use crate::schemas::question::{
    QuestionAdded, QuestionChange, QuestionColumns, QuestionDetails, QuestionKind,
    QuestionRequest,
};

const NOT_FOUND: &str = "Question not found";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(add_question))
        .route("/:id", get(question_details).put(update_question).delete(delete_question))
        .route("/:id/v2", get(question_columns))
        .route_layer(middleware::from_fn_with_state(INSTRUCTOR_ONLY, authorize))
}

/// Type must be known; multiple choice needs at least two non-blank choices.
fn checked_kind(raw: &str, payload: &QuestionRequest) -> Result<QuestionKind, ApiError> {
    let kind = QuestionKind::parse(raw)
        .ok_or_else(|| ApiError::bad_request("Question type must be either 'MCQ' or 'TF'"))?;
    if kind == QuestionKind::MultipleChoice && payload.given_choices().len() < 2 {
        return Err(ApiError::bad_request("MCQ questions must have at least 2 choices"));
    }
    Ok(kind)
}

fn with_choices(mut call: ProcedureCall, payload: &QuestionRequest) -> ProcedureCall {
    for (index, choice) in payload.slots().into_iter().enumerate() {
        call = call.input(format!("choice{}", index + 1), SqlType::VarChar(255), choice);
    }
    call
}

fn listed_choices(kind: QuestionKind, payload: &QuestionRequest) -> Option<Vec<String>> {
    (kind == QuestionKind::MultipleChoice).then(|| payload.given_choices())
}

async fn add_question(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<QuestionRequest>,
) -> Result<Envelope<QuestionAdded>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while adding question");
    let (Some(text), Some(raw_kind), Some(answer), Some(course_id)) = (
        payload.question_text.clone(),
        payload.question_type.clone(),
        payload.correct_answer.clone(),
        payload.course_id,
    ) else {
        return Err(ApiError::bad_request(
            "Please provide question text, type, correct answer, and course ID",
        ));
    };
    let kind = checked_kind(&raw_kind, &payload)?;

    let call = ProcedureCall::new("sp_add_question")
        .input("question_text", SqlType::Text, text.as_str())
        .input("question_type", SqlType::VarChar(50), kind.as_str())
        .input("correct_ans", SqlType::VarChar(255), answer.as_str())
        .input("course_id", SqlType::Int, course_id);
    let result = procedures::call(&state, with_choices(call, &payload), CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::data(QuestionAdded {
        question_text: text,
        question_type: kind,
        correct_answer: answer,
        course_id,
        choices: listed_choices(kind, &payload),
    })
    .with_message("Question added successfully")
    .created())
}

async fn question_details(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<QuestionDetails>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching question details")
        .not_found(NOT_FOUND);

    let call = ProcedureCall::new("sp_get_question_details").input("question_id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    let details = QuestionDetails::from_rows(result.recordset())
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    Ok(Envelope::data(details))
}

async fn question_columns(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<QuestionColumns>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching question details")
        .not_found(NOT_FOUND);

    let call =
        ProcedureCall::new("sp_get_question_details_v2").input("question_id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    let row = result.first_row().ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    Ok(Envelope::data(QuestionColumns::from_row(row)))
}

async fn update_question(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
    JsonBody(payload): JsonBody<QuestionRequest>,
) -> Result<Envelope<QuestionChange>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while updating question").not_found(NOT_FOUND);
    let (Some(text), Some(raw_kind), Some(answer)) = (
        payload.question_text.clone(),
        payload.question_type.clone(),
        payload.correct_answer.clone(),
    ) else {
        return Err(ApiError::bad_request(
            "Please provide question text, type, and correct answer",
        ));
    };
    let kind = checked_kind(&raw_kind, &payload)?;

    let call = ProcedureCall::new("sp_update_question")
        .input("question_id", SqlType::Int, id)
        .input("question_text", SqlType::Text, text.as_str())
        .input("question_type", SqlType::VarChar(50), kind.as_str())
        .input("correct_ans", SqlType::VarChar(255), answer.as_str());
    let result = procedures::call(&state, with_choices(call, &payload), CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::data(QuestionChange {
        id,
        question_text: text,
        question_type: kind,
        correct_answer: answer,
        choices: listed_choices(kind, &payload),
    })
    .with_message("Question updated successfully"))
}

async fn delete_question(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<()>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while deleting question").not_found(NOT_FOUND);

    let call = ProcedureCall::new("sp_delete_question").input("question_id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::message("Question deleted successfully"))
}
