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
use crate::schemas::track::{TrackChange, TrackCreated, TrackRequest, TrackResponse};

const NOT_FOUND: &str = "Track not found";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tracks).merge(restrict(INSTRUCTOR_ONLY, post(create_track))))
        .route(
            "/:id",
            get(get_track).merge(restrict(INSTRUCTOR_ONLY, put(update_track).delete(delete_track))),
        )
}

async fn create_track(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<TrackRequest>,
) -> Result<Envelope<TrackCreated>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while creating track");
    let (Some(name), Some(manager_id)) = (payload.name, payload.manager_id) else {
        return Err(ApiError::bad_request("Please provide track name and manager ID"));
    };

    let call = ProcedureCall::new("sp_insert_track")
        .input("tr_name", SqlType::VarChar(100), name)
        .input("manager_id", SqlType::Int, manager_id);
    let result = procedures::call(&state, call, CTX).await?;
    let row = procedures::require_row(&result)?;
    procedures::ensure_accepted(row, CTX)?;

    Ok(Envelope::data(TrackCreated::from_row(row))
        .with_message("Track created successfully")
        .created())
}

async fn update_track(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
    JsonBody(payload): JsonBody<TrackRequest>,
) -> Result<Envelope<TrackChange>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while updating track").not_found(NOT_FOUND);
    if payload.name.is_none() && payload.manager_id.is_none() {
        return Err(ApiError::bad_request("Please provide at least track name or manager ID"));
    }

    let call = ProcedureCall::new("sp_update_track")
        .input("tr_id", SqlType::Int, id)
        .input("tr_name", SqlType::VarChar(100), payload.name.clone())
        .input("manager_id", SqlType::Int, payload.manager_id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_accepted(procedures::require_row(&result)?, CTX)?;

    Ok(Envelope::data(TrackChange { id, name: payload.name, manager_id: payload.manager_id })
        .with_message("Track updated successfully"))
}

async fn delete_track(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<()>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while deleting track").not_found(NOT_FOUND);

    let call = ProcedureCall::new("sp_delete_track").input("tr_id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_accepted(procedures::require_row(&result)?, CTX)?;

    Ok(Envelope::message("Track deleted successfully"))
}

async fn list_tracks(
    State(state): State<AppState>,
) -> Result<Envelope<Vec<TrackResponse>>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching tracks");

    let result = procedures::call(&state, ProcedureCall::new("sp_select_tracks"), CTX).await?;
    Ok(Envelope::list(result.recordset().iter().map(TrackResponse::from_row).collect()))
}

async fn get_track(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<TrackResponse>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while fetching track").not_found(NOT_FOUND);

    let call = ProcedureCall::new("sp_select_tracks_byid").input("tr_id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    let row = result.first_row().ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    procedures::ensure_accepted(row, CTX)?;

    Ok(Envelope::data(TrackResponse::from_row(row)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::db::types::Role;
    use crate::db::SqlValue;
    use crate::test_support::{self, ScriptedGateway};

    #[tokio::test]
    async fn create_requires_name_and_manager() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) = ctx
            .send(Method::POST, "/api/tracks", Some(&token), Some(json!({"name": "Cloud"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide track name and manager ID");
    }

    #[tokio::test]
    async fn partial_update_binds_nulls_and_echoes_given_fields() {
        let gateway = ScriptedGateway::new()
            .rows("sp_update_track", vec![json!({"message": "Track updated successfully"})]);
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) = ctx
            .send(Method::PUT, "/api/tracks/3", Some(&token), Some(json!({"managerId": "12"})))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({"id": 3, "managerId": 12}));
        let call = ctx.gateway.called("sp_update_track").expect("call");
        assert_eq!(call.value("tr_name"), Some(&SqlValue::Null));
        assert_eq!(call.value("manager_id"), Some(&SqlValue::Int(12)));
    }

    #[tokio::test]
    async fn update_needs_some_field() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) =
            ctx.send(Method::PUT, "/api/tracks/3", Some(&token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide at least track name or manager ID");
    }

    #[tokio::test]
    async fn lookup_includes_manager_details() {
        let gateway = ScriptedGateway::new().rows(
            "sp_select_tracks_byid",
            vec![json!({
                "tr_id": 3,
                "tr_name": "Cloud",
                "manager_id": 12,
                "manager_name": "Hany",
                "manager_email": ""
            })],
        );
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(7, Role::Student);

        let (status, body) = ctx.send(Method::GET, "/api/tracks/3", Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!({
                "id": 3,
                "name": "Cloud",
                "managerId": 12,
                "managerName": "Hany",
                "managerEmail": null
            })
        );
    }

    #[tokio::test]
    async fn delete_of_missing_track_is_not_found() {
        let gateway = ScriptedGateway::new()
            .rows("sp_delete_track", vec![json!({"message": "Track not found"})]);
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) = ctx.send(Method::DELETE, "/api/tracks/3", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Track not found");
    }
}
