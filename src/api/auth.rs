use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};

use crate::api::envelope::Envelope;
use crate::api::errors::ApiError;
use crate::api::extract::JsonBody;
use crate::api::guards::RequestIdentity;
use crate::api::procedures::{self, CallContext};
use crate::api::validation::{date_of_birth, validate_email, validate_password_len};
use crate::core::security::{self, SecurityError};
use crate::core::state::AppState;
use crate::db::types::Role;
use crate::db::{ProcedureCall, Row, SqlType};
use crate::schemas::auth::{
    AuthPayload, ChangePasswordRequest, InstructorRegistration, LoginRequest,
    StudentRegistration, UserSummary,
};

const ADD_STUDENT: CallContext = CallContext::new("An error occurred while adding student");
const ADD_INSTRUCTOR: CallContext = CallContext::new("An error occurred while adding instructor");
const LOGIN: CallContext = CallContext::new("An error occurred during login");
const PROFILE: CallContext = CallContext::new("An error occurred while fetching profile");
const CHANGE_PASSWORD: CallContext =
    CallContext::new("An error occurred while changing password");

const SHORT_PASSWORD: &str = "Password must be at least 6 characters long";
const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Registration and login. Mounted without authentication.
pub(crate) fn public_router() -> Router<AppState> {
    Router::new()
        .route("/add-user/student", post(add_student))
        .route("/add-user/instructor", post(add_instructor))
        .route("/login", post(login))
}

/// Profile routes; the caller mounts these behind authentication.
pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(profile))
        .route("/change-password", put(change_password))
}

async fn add_student(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<StudentRegistration>,
) -> Result<Envelope<AuthPayload>, ApiError> {
    let (Some(name), Some(email), Some(password), Some(dob), Some(track_id)) = (
        payload.name,
        payload.email,
        payload.password,
        payload.date_of_birth,
        payload.track_id,
    ) else {
        return Err(ApiError::bad_request(
            "Please provide name, email, password, date of birth, and track ID",
        ));
    };

    validate_email(&email)?;
    validate_password_len(&password, SHORT_PASSWORD)?;
    let dob = date_of_birth(&dob)?;

    let hashed = security::hash_password(&password)
        .map_err(|err| ApiError::internal(err, ADD_STUDENT.failure()))?;

    let call = ProcedureCall::new("sp_add_user_student")
        .input("student_name", SqlType::VarChar(100), name)
        .input("student_email", SqlType::VarChar(100), email)
        .input("password", SqlType::VarChar(255), hashed)
        .input("date_of_birth", SqlType::Date, dob)
        .input("tr_id", SqlType::Int, track_id)
        .input("phone", SqlType::VarChar(20), payload.phone)
        .input("address", SqlType::VarChar(255), payload.address);

    register(&state, call, "Student added successfully", ADD_STUDENT).await
}

async fn add_instructor(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<InstructorRegistration>,
) -> Result<Envelope<AuthPayload>, ApiError> {
    let (Some(name), Some(email), Some(password), Some(dob)) =
        (payload.name, payload.email, payload.password, payload.date_of_birth)
    else {
        return Err(ApiError::bad_request(
            "Please provide name, email, password, and date of birth",
        ));
    };

    validate_email(&email)?;
    validate_password_len(&password, SHORT_PASSWORD)?;
    let dob = date_of_birth(&dob)?;

    let hashed = security::hash_password(&password)
        .map_err(|err| ApiError::internal(err, ADD_INSTRUCTOR.failure()))?;

    let call = ProcedureCall::new("sp_add_user_instructor")
        .input("instructor_name", SqlType::VarChar(100), name)
        .input("instructor_email", SqlType::VarChar(100), email)
        .input("password", SqlType::VarChar(255), hashed)
        .input("date_of_birth", SqlType::Date, dob)
        .input("phone", SqlType::VarChar(20), payload.phone)
        .input("specialization", SqlType::VarChar(100), payload.specialization);

    register(&state, call, "Instructor added successfully", ADD_INSTRUCTOR).await
}

/// Runs a registration routine. A `result` of -1 means the routine refused
/// the registration and its `message` says why.
async fn register(
    state: &AppState,
    call: ProcedureCall,
    created: &'static str,
    ctx: CallContext,
) -> Result<Envelope<AuthPayload>, ApiError> {
    let result = procedures::call(state, call, ctx).await?;
    if let Some(reason) = procedures::refusal(&result) {
        return Err(ApiError::BadRequest(reason));
    }

    let row = procedures::require_row(&result)?;
    Ok(Envelope::data(issue_token(state, row, ctx)?).with_message(created).created())
}

fn issue_token(state: &AppState, row: &Row, ctx: CallContext) -> Result<AuthPayload, ApiError> {
    let role = row
        .text("role")
        .as_deref()
        .and_then(Role::parse)
        .ok_or_else(|| ApiError::internal("account row has no recognised role", ctx.failure()))?;
    let subject_id = row
        .int("user_id")
        .and_then(|id| i32::try_from(id).ok())
        .ok_or_else(|| ApiError::internal("account row has no usable user_id", ctx.failure()))?;

    let token = security::create_access_token(subject_id, role, state.settings(), None)
        .map_err(|err| ApiError::internal(err, ctx.failure()))?;

    Ok(AuthPayload { token, user: UserSummary::from_row(row, role) })
}

async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Envelope<AuthPayload>, ApiError> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(ApiError::bad_request("Please provide email and password"));
    };

    let call = ProcedureCall::new("sp_login").input("email", SqlType::VarChar(100), email);
    let result = procedures::call(&state, call, LOGIN).await?;

    let Some(account) = result.first_row() else {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
    };

    if !account.flag("is_active") {
        return Err(ApiError::Forbidden(
            "Your account has been deactivated. Please contact support.".to_string(),
        ));
    }

    let stored = account.text("password").unwrap_or_default();
    if !password_matches(&password, &stored)? {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
    }

    Ok(Envelope::data(issue_token(&state, account, LOGIN)?).with_message("Login successful"))
}

/// A stored value that is not a recognisable password hash never matches.
fn password_matches(password: &str, stored: &str) -> Result<bool, ApiError> {
    match security::verify_password(password, stored) {
        Ok(matches) => Ok(matches),
        Err(SecurityError::Verification) => {
            tracing::warn!("Stored password hash could not be parsed");
            Ok(false)
        }
        Err(err) => Err(ApiError::internal(err, "Failed to verify password")),
    }
}

async fn profile(
    identity: RequestIdentity,
    State(state): State<AppState>,
) -> Result<Envelope<Row>, ApiError> {
    let mut profile = match identity.role {
        Role::Student => {
            let result =
                procedures::call(&state, ProcedureCall::new("sp_select_students"), PROFILE)
                    .await?;
            result
                .into_recordset()
                .into_iter()
                .find(|row| row.int("student_id") == Some(i64::from(identity.subject_id)))
                .ok_or_else(|| ApiError::not_found("Student not found"))?
        }
        Role::Instructor => {
            let call = ProcedureCall::new("sp_select_instructor").input(
                "id",
                SqlType::Int,
                identity.subject_id,
            );
            let result = procedures::call(&state, call, PROFILE).await?;
            result
                .into_recordset()
                .into_iter()
                .next()
                .ok_or_else(|| ApiError::not_found("User not found"))?
        }
    };

    profile.remove("password");
    Ok(Envelope::data(profile))
}

async fn change_password(
    identity: RequestIdentity,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<Envelope<()>, ApiError> {
    let (Some(current), Some(new_password)) = (payload.current_password, payload.new_password)
    else {
        return Err(ApiError::bad_request("Please provide current password and new password"));
    };
    validate_password_len(&new_password, "New password must be at least 6 characters long")?;

    let (lookup, update) = match identity.role {
        Role::Student => ("sp_get_student_password", "sp_update_student_password"),
        Role::Instructor => ("sp_get_instructor_password", "sp_update_instructor_password"),
    };

    let call = ProcedureCall::new(lookup).input("id", SqlType::Int, identity.subject_id);
    let result = procedures::call(&state, call, CHANGE_PASSWORD).await?;
    let account = result.first_row().ok_or_else(|| ApiError::not_found("User not found"))?;

    let stored = account.text("password").unwrap_or_default();
    if !password_matches(&current, &stored)? {
        return Err(ApiError::Unauthorized("Current password is incorrect"));
    }

    let hashed = security::hash_password(&new_password)
        .map_err(|err| ApiError::internal(err, CHANGE_PASSWORD.failure()))?;
    let call = ProcedureCall::new(update)
        .input("id", SqlType::Int, identity.subject_id)
        .input("password", SqlType::VarChar(255), hashed);
    procedures::call(&state, call, CHANGE_PASSWORD).await?;

    Ok(Envelope::message("Password changed successfully"))
}
