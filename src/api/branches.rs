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
use crate::schemas::branch::{BranchRequest, BranchResponse};

const NOT_FOUND: &str = "Branch not found";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_branches).merge(restrict(INSTRUCTOR_ONLY, post(create_branch))))
        .route(
            "/:id",
            get(get_branch)
                .merge(restrict(INSTRUCTOR_ONLY, put(update_branch).delete(delete_branch))),
        )
}

fn required_name(payload: BranchRequest) -> Result<String, ApiError> {
    payload.name.ok_or_else(|| ApiError::bad_request("Please provide branch name"))
}

async fn create_branch(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<BranchRequest>,
) -> Result<Envelope<BranchResponse>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while creating branch");
    let name = required_name(payload)?;

    let call =
        ProcedureCall::new("sp_insert_branch").input("br_name", SqlType::VarChar(100), name);
    let result = procedures::call(&state, call, CTX).await?;
    let row = procedures::require_row(&result)?;
    procedures::ensure_accepted(row, CTX)?;

    Ok(Envelope::data(BranchResponse::from_row(row))
        .with_message("Branch created successfully")
        .created())
}

async fn update_branch(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
    JsonBody(payload): JsonBody<BranchRequest>,
) -> Result<Envelope<BranchResponse>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while updating branch").not_found(NOT_FOUND);
    let name = required_name(payload)?;

    let call = ProcedureCall::new("sp_update_branch")
        .input("br_id", SqlType::Int, id)
        .input("br_name", SqlType::VarChar(100), name.as_str());
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_accepted(procedures::require_row(&result)?, CTX)?;

    Ok(Envelope::data(BranchResponse { id: Some(i64::from(id)), name: Some(name) })
        .with_message("Branch updated successfully"))
}

async fn delete_branch(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<()>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while deleting branch").not_found(NOT_FOUND);

    let call = ProcedureCall::new("sp_delete_branch").input("br_id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_accepted(procedures::require_row(&result)?, CTX)?;

    Ok(Envelope::message("Branch deleted successfully"))
}

async fn list_branches(
    State(state): State<AppState>,
) -> Result<Envelope<Vec<BranchResponse>>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching branches");

    let result = procedures::call(&state, ProcedureCall::new("sp_select_branches"), CTX).await?;
    Ok(Envelope::list(result.recordset().iter().map(BranchResponse::from_row).collect()))
}

async fn get_branch(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<BranchResponse>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while fetching branch").not_found(NOT_FOUND);

    let call = ProcedureCall::new("sp_select_branches_byid").input("br_id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    let row = result.first_row().ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    procedures::ensure_accepted(row, CTX)?;

    Ok(Envelope::data(BranchResponse::from_row(row)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::db::types::Role;
    use crate::db::SqlValue;
    use crate::test_support::{self, ScriptedGateway};

    #[tokio::test]
    async fn listing_maps_columns_and_counts() {
        let gateway = ScriptedGateway::new().rows(
            "sp_select_branches",
            vec![
                json!({"br_id": 1, "br_name": "Smart Village"}),
                json!({"br_id": 2, "br_name": "Alexandria"}),
            ],
        );
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(5, Role::Student);

        let (status, body) = ctx.send(Method::GET, "/api/branches", Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "success": true,
                "count": 2,
                "data": [
                    {"id": 1, "name": "Smart Village"},
                    {"id": 2, "name": "Alexandria"}
                ]
            })
        );
    }

    #[tokio::test]
    async fn students_cannot_create_branches() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;
        let token = ctx.token(5, Role::Student);

        let (status, body) = ctx
            .send(Method::POST, "/api/branches", Some(&token), Some(json!({"name": "Assiut"})))
            .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Access denied. Only Instructor can access this resource.");
        assert!(ctx.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn create_reports_procedure_errors() {
        let gateway = ScriptedGateway::new().rows(
            "sp_insert_branch",
            vec![json!({"message": "Error occurred", "errormessage": "Branch name is required"})],
        );
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) = ctx
            .send(Method::POST, "/api/branches", Some(&token), Some(json!({"name": "Assiut"})))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Branch name is required");
    }

    #[tokio::test]
    async fn create_returns_inserted_branch() {
        let gateway = ScriptedGateway::new().rows(
            "sp_insert_branch",
            vec![json!({"message": "Branch added successfully", "br_id": 8, "br_name": "Assiut"})],
        );
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) = ctx
            .send(Method::POST, "/api/branches", Some(&token), Some(json!({"name": "Assiut"})))
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Branch created successfully");
        assert_eq!(body["data"], json!({"id": 8, "name": "Assiut"}));
    }

    #[tokio::test]
    async fn update_of_missing_branch_is_not_found() {
        let gateway = ScriptedGateway::new()
            .rows("sp_update_branch", vec![json!({"message": "Branch ID does not exist"})]);
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) = ctx
            .send(Method::PUT, "/api/branches/99", Some(&token), Some(json!({"name": "Qena"})))
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Branch not found");
        let call = ctx.gateway.called("sp_update_branch").expect("call");
        assert_eq!(call.value("br_id"), Some(&SqlValue::Int(99)));
    }

    #[tokio::test]
    async fn missing_name_and_bad_ids_are_rejected() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) =
            ctx.send(Method::POST, "/api/branches", Some(&token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide branch name");

        let (status, body) = ctx.send(Method::GET, "/api/branches/abc", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid path parameter");
    }

    #[tokio::test]
    async fn empty_lookup_is_not_found() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;
        let token = ctx.token(1, Role::Student);

        let (status, body) = ctx.send(Method::GET, "/api/branches/4", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Branch not found");
    }

    #[tokio::test]
    async fn unavailable_database_is_503() {
        let ctx = test_support::test_app(ScriptedGateway::new().unavailable()).await;
        let token = ctx.token(1, Role::Student);

        let (status, body) = ctx.send(Method::GET, "/api/branches", Some(&token), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Database unavailable");
    }
}
