use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};

use crate::api::envelope::Envelope;
use crate::api::errors::ApiError;
use crate::api::extract::{JsonBody, PathParams};
use crate::api::guards::{restrict, INSTRUCTOR_ONLY};
use crate::api::procedures::{self, CallContext};
use crate::core::state::AppState;
use crate::db::{ProcedureCall, SqlType};
use crate::schemas::course::{CourseChange, CourseCreated, CourseRequest, CourseResponse};

const NOT_FOUND: &str = "Course not found";
const NON_POSITIVE_DURATION: &str = "Duration must be a positive number";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).merge(restrict(INSTRUCTOR_ONLY, post(create_course))))
        .route(
            "/:id",
            get(get_course)
                .merge(restrict(INSTRUCTOR_ONLY, put(update_course).delete(delete_course))),
        )
}

async fn create_course(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CourseRequest>,
) -> Result<Envelope<CourseCreated>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while creating course")
        .conflict("Course code already exists");
    let (Some(name), Some(code), Some(duration)) = (payload.name, payload.code, payload.duration)
    else {
        return Err(ApiError::bad_request("Please provide course name, code, and duration"));
    };
    if duration < 0 {
        return Err(ApiError::bad_request(NON_POSITIVE_DURATION));
    }

    let call = ProcedureCall::new("sp_insert_course")
        .input("name", SqlType::VarChar(150), name.as_str())
        .input("code", SqlType::VarChar(50), code.as_str())
        .input("duration", SqlType::Int, duration);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::data(CourseCreated { name, code, duration })
        .with_message("Course created successfully")
        .created())
}

async fn update_course(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
    JsonBody(payload): JsonBody<CourseRequest>,
) -> Result<Envelope<CourseChange>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while updating course").not_found(NOT_FOUND);
    let CourseRequest { name, code, duration } = payload;
    if name.is_none() && code.is_none() && duration.is_none() {
        return Err(ApiError::bad_request("Please provide at least one field to update"));
    }
    if duration.is_some_and(|duration| duration < 0) {
        return Err(ApiError::bad_request(NON_POSITIVE_DURATION));
    }

    let call = ProcedureCall::new("sp_update_course")
        .input("id", SqlType::Int, id)
        .input("name", SqlType::VarChar(100), name.clone())
        .input("code", SqlType::VarChar(150), code.clone())
        .input("duration", SqlType::Int, duration);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::data(CourseChange { id, name, code, duration })
        .with_message("Course updated successfully"))
}

async fn delete_course(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<()>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while deleting course").not_found(NOT_FOUND);

    let call = ProcedureCall::new("sp_delete_course").input("id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::message("Course deleted successfully"))
}

async fn list_courses(
    State(state): State<AppState>,
) -> Result<Envelope<Vec<CourseResponse>>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching courses");

    let result = procedures::call(&state, ProcedureCall::new("sp_select_courses"), CTX).await?;
    Ok(Envelope::list(result.recordset().iter().map(CourseResponse::from_row).collect()))
}

async fn get_course(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<CourseResponse>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while fetching course").not_found(NOT_FOUND);

    let call = ProcedureCall::new("sp_select_course").input("id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    let row = result.first_row().ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    Ok(Envelope::data(CourseResponse::from_row(row)))
}
