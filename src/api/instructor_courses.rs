use axum::{
    extract::State,
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::api::envelope::Envelope;
use crate::api::errors::ApiError;
use crate::api::extract::{JsonBody, PathParams};
use crate::api::guards::{authorize, RequestIdentity, INSTRUCTOR_ONLY};
use crate::api::procedures::{self, CallContext};
use crate::core::state::AppState;
use crate::db::{ProcedureCall, SqlType};
use crate::schemas::course::CourseResponse;
use crate::schemas::instructor_course::{
    CourseAssignment, CourseAssignmentRequest, CourseDetails, CourseWithTopics, TopicAdded,
    TopicRequest, TrackAssignment, TrackAssignmentRequest,
};

const FETCH_COURSES: CallContext =
    CallContext::new("An error occurred while fetching instructor courses");

/// Every route here is for instructors only.
pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/my-courses", get(my_courses))
        .route("/my-courses/:course_id", get(course_details))
        .route("/my-courses-with-topics", get(courses_with_topics))
        .route("/assign-course", post(assign_course))
        .route("/assign-course/:instructor_id/:course_id", delete(unassign_course))
        .route("/course-topic", post(add_topic))
        .route("/course-topic/:course_id/:topic_name", delete(remove_topic))
        .route("/assign-track", post(assign_track))
        .route_layer(middleware::from_fn_with_state(INSTRUCTOR_ONLY, authorize))
}

async fn my_courses(
    identity: RequestIdentity,
    State(state): State<AppState>,
) -> Result<Envelope<Vec<CourseResponse>>, ApiError> {
    let call = ProcedureCall::new("sp_get_instructor_courses").input(
        "instructor_id",
        SqlType::Int,
        identity.subject_id,
    );
    let result = procedures::call(&state, call, FETCH_COURSES).await?;
    if let Some(reason) = procedures::refusal(&result) {
        return Err(ApiError::NotFound(reason));
    }

    Ok(Envelope::list(result.recordset().iter().map(CourseResponse::from_row).collect()))
}

async fn course_details(
    identity: RequestIdentity,
    State(state): State<AppState>,
    PathParams(course_id): PathParams<i32>,
) -> Result<Envelope<CourseDetails>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching course details");

    let call = ProcedureCall::new("sp_get_instructor_course_details")
        .input("instructor_id", SqlType::Int, identity.subject_id)
        .input("course_id", SqlType::Int, course_id);
    let result = procedures::call(&state, call, CTX).await?;
    // The routine refuses courses the instructor does not teach.
    if let Some(reason) = procedures::refusal(&result) {
        return Err(ApiError::Forbidden(reason));
    }

    let course = result.first_row().ok_or_else(|| ApiError::not_found("Course not found"))?;

    Ok(Envelope::data(CourseDetails::from_rows(course, result.record_set(1))))
}

async fn courses_with_topics(
    identity: RequestIdentity,
    State(state): State<AppState>,
) -> Result<Envelope<Vec<CourseWithTopics>>, ApiError> {
    let call = ProcedureCall::new("sp_get_instructor_courses_with_topics").input(
        "instructor_id",
        SqlType::Int,
        identity.subject_id,
    );
    let result = procedures::call(&state, call, FETCH_COURSES).await?;
    if let Some(reason) = procedures::refusal(&result) {
        return Err(ApiError::NotFound(reason));
    }

    Ok(Envelope::list(CourseWithTopics::group(result.recordset())))
}

async fn assign_course(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CourseAssignmentRequest>,
) -> Result<Envelope<CourseAssignment>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while assigning instructor to course")
            .conflict("Instructor is already assigned to this course");
    let (Some(instructor_id), Some(course_id)) = (payload.instructor_id, payload.course_id) else {
        return Err(ApiError::bad_request("Please provide both instructor ID and course ID"));
    };

    let call = ProcedureCall::new("sp_assign_instructor_to_course")
        .input("instructor_id", SqlType::Int, instructor_id)
        .input("course_id", SqlType::Int, course_id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::data(CourseAssignment { instructor_id, course_id })
        .with_message("Instructor assigned to course successfully")
        .created())
}

async fn unassign_course(
    State(state): State<AppState>,
    PathParams((instructor_id, course_id)): PathParams<(i32, i32)>,
) -> Result<Envelope<()>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while removing instructor from course");

    let call = ProcedureCall::new("sp_deassign_instructor_to_course")
        .input("instructor_id", SqlType::Int, instructor_id)
        .input("course_id", SqlType::Int, course_id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::message("Instructor removed from course successfully"))
}

async fn add_topic(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<TopicRequest>,
) -> Result<Envelope<TopicAdded>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while adding topic to course");
    let (Some(course_id), Some(topic_name)) = (payload.course_id, payload.topic_name) else {
        return Err(ApiError::bad_request("Please provide both course ID and topic name"));
    };

    let call = ProcedureCall::new("sp_add_course_topic")
        .input("course_id", SqlType::Int, course_id)
        .input("topic_name", SqlType::VarChar(150), topic_name.as_str());
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::data(TopicAdded { course_id, topic_name })
        .with_message("Topic added to course successfully")
        .created())
}

/// The topic segment arrives percent-decoded.
async fn remove_topic(
    State(state): State<AppState>,
    PathParams((course_id, topic_name)): PathParams<(i32, String)>,
) -> Result<Envelope<()>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while removing topic from course");

    let call = ProcedureCall::new("sp_delete_course_topic")
        .input("course_id", SqlType::Int, course_id)
        .input("topic_name", SqlType::VarChar(150), topic_name);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::message("Topic removed from course successfully"))
}

async fn assign_track(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<TrackAssignmentRequest>,
) -> Result<Envelope<TrackAssignment>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while assigning instructor to track")
            .conflict("Instructor is already assigned to this track");
    let (Some(instructor_id), Some(track_id)) = (payload.instructor_id, payload.track_id) else {
        return Err(ApiError::bad_request("Please provide both instructor ID and track ID"));
    };

    let call = ProcedureCall::new("sp_assign_instructor_to_track")
        .input("instructor_id", SqlType::Int, instructor_id)
        .input("track_id", SqlType::Int, track_id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::data(TrackAssignment { instructor_id, track_id })
        .with_message("Instructor assigned to track successfully")
        .created())
}
