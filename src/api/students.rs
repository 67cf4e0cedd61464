use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Router,
};

use crate::api::envelope::Envelope;
use crate::api::errors::ApiError;
use crate::api::extract::{JsonBody, PathParams};
use crate::api::guards::{restrict, RequestIdentity, INSTRUCTOR_ONLY};
use crate::api::procedures::{self, CallContext};
use crate::api::validation::{date_of_birth, validate_email};
use crate::core::state::AppState;
use crate::db::types::Role;
use crate::db::{ProcedureCall, SqlType};
use crate::schemas::student::{
    EnrolledCourse, Enrollment, EnrollmentRequest, StudentChange, StudentResponse, StudentUpdate,
};

const NOT_FOUND: &str = "Student not found";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", restrict(INSTRUCTOR_ONLY, get(list_students)))
        .route("/:id", restrict(INSTRUCTOR_ONLY, put(update_student).delete(delete_student)))
        .route("/courses", get(own_courses))
        .route("/courses/:id", get(student_courses))
        .route("/assign-course", restrict(INSTRUCTOR_ONLY, post(enroll)))
        .route(
            "/assign-course/:student_id/:course_id",
            restrict(INSTRUCTOR_ONLY, delete(unenroll)),
        )
}

async fn list_students(
    State(state): State<AppState>,
) -> Result<Envelope<Vec<StudentResponse>>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching students");

    let result = procedures::call(&state, ProcedureCall::new("sp_select_students"), CTX).await?;
    Ok(Envelope::list(result.recordset().iter().map(StudentResponse::from_row).collect()))
}

async fn update_student(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
    JsonBody(payload): JsonBody<StudentUpdate>,
) -> Result<Envelope<StudentChange>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while updating student").not_found(NOT_FOUND);
    let (Some(name), Some(email), Some(raw_dob), Some(track_id)) =
        (payload.name, payload.email, payload.date_of_birth, payload.track_id)
    else {
        return Err(ApiError::bad_request(
            "Please provide name, email, date of birth, and track ID",
        ));
    };

    validate_email(&email)?;
    let dob = date_of_birth(&raw_dob)?;

    let call = ProcedureCall::new("sp_update_student")
        .input("student_id", SqlType::Int, id)
        .input("student_name", SqlType::VarChar(100), name.as_str())
        .input("student_email", SqlType::VarChar(100), email.as_str())
        .input("date_of_birth", SqlType::Date, dob)
        .input("tr_id", SqlType::Int, track_id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::data(StudentChange { id, name, email, date_of_birth: raw_dob, track_id })
        .with_message("Student updated successfully"))
}

async fn delete_student(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<()>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while deleting student").not_found(NOT_FOUND);

    let call = ProcedureCall::new("sp_delete_student").input("student_id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::message("Student deleted successfully"))
}

async fn own_courses(
    identity: RequestIdentity,
    State(state): State<AppState>,
) -> Result<Envelope<Vec<EnrolledCourse>>, ApiError> {
    courses_for(&state, identity, None).await
}

async fn student_courses(
    identity: RequestIdentity,
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<Vec<EnrolledCourse>>, ApiError> {
    courses_for(&state, identity, Some(id)).await
}

/// Students always see their own enrollments whatever the path says;
/// instructors must name the student.
async fn courses_for(
    state: &AppState,
    identity: RequestIdentity,
    requested: Option<i32>,
) -> Result<Envelope<Vec<EnrolledCourse>>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching student courses");
    let student_id = match identity.role {
        Role::Student => identity.subject_id,
        Role::Instructor => requested
            .filter(|id| *id != 0)
            .ok_or_else(|| ApiError::bad_request("Student ID is required"))?,
    };

    let call =
        ProcedureCall::new("sp_get_student_courses").input("student_id", SqlType::Int, student_id);
    let result = procedures::call(state, call, CTX).await?;
    Ok(Envelope::list(result.recordset().iter().map(EnrolledCourse::from_row).collect()))
}

async fn enroll(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<EnrollmentRequest>,
) -> Result<Envelope<Enrollment>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while assigning course to student")
            .conflict("Course is already assigned to this student");
    let (Some(student_id), Some(course_id)) = (payload.student_id, payload.course_id) else {
        return Err(ApiError::bad_request("Please provide student ID and course ID"));
    };

    let call = ProcedureCall::new("sp_assign_course_to_student")
        .input("student_id", SqlType::Int, student_id)
        .input("course_id", SqlType::Int, course_id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::data(Enrollment { student_id, course_id })
        .with_message("Course assigned to student successfully")
        .created())
}

async fn unenroll(
    State(state): State<AppState>,
    PathParams((student_id, course_id)): PathParams<(i32, i32)>,
) -> Result<Envelope<()>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while removing course from student");

    let call = ProcedureCall::new("sp_remove_course_from_student")
        .input("student_id", SqlType::Int, student_id)
        .input("course_id", SqlType::Int, course_id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_status(&result, CTX)?;

    Ok(Envelope::message("Course removed from student successfully"))
}
