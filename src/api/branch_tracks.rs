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
use crate::schemas::branch_track::{
    AssignTrackRequest, BranchTrack, BranchTrackMove, MoveTrackRequest,
};

const NOT_FOUND: &str = "Branch-track relation not found";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_relations).merge(restrict(INSTRUCTOR_ONLY, post(assign_track))))
        .route(
            "/:branch_id/:track_id",
            get(get_relation)
                .merge(restrict(INSTRUCTOR_ONLY, put(move_relation).delete(remove_track))),
        )
}

fn pair(procedure: &str, branch_id: i32, track_id: i32) -> ProcedureCall {
    ProcedureCall::new(procedure)
        .input("br_id", SqlType::Int, branch_id)
        .input("tr_id", SqlType::Int, track_id)
}

async fn assign_track(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<AssignTrackRequest>,
) -> Result<Envelope<BranchTrack>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while assigning track to branch")
            .conflict("This track is already assigned to this branch");
    let (Some(branch_id), Some(track_id)) = (payload.branch_id, payload.track_id) else {
        return Err(ApiError::bad_request("Please provide both branch ID and track ID"));
    };

    let result =
        procedures::call(&state, pair("sp_branch_track_insert", branch_id, track_id), CTX).await?;
    procedures::ensure_accepted(procedures::require_row(&result)?, CTX)?;

    Ok(Envelope::data(BranchTrack::new(branch_id, track_id))
        .with_message("Track assigned to branch successfully")
        .created())
}

async fn move_relation(
    State(state): State<AppState>,
    PathParams((branch_id, track_id)): PathParams<(i32, i32)>,
    JsonBody(payload): JsonBody<MoveTrackRequest>,
) -> Result<Envelope<BranchTrackMove>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while updating branch-track relation");
    if payload.new_branch_id.is_none() && payload.new_track_id.is_none() {
        return Err(ApiError::bad_request(
            "Please provide at least new branch ID or new track ID",
        ));
    }

    let call = pair("sp_branch_track_update", branch_id, track_id)
        .input("new_br_id", SqlType::Int, payload.new_branch_id)
        .input("new_tr_id", SqlType::Int, payload.new_track_id);
    let result = procedures::call(&state, call, CTX).await?;
    procedures::ensure_accepted(procedures::require_row(&result)?, CTX)?;

    Ok(Envelope::data(BranchTrackMove {
        old_branch_id: branch_id,
        old_track_id: track_id,
        new_branch_id: payload.new_branch_id.unwrap_or(branch_id),
        new_track_id: payload.new_track_id.unwrap_or(track_id),
    })
    .with_message("Branch-track relation updated successfully"))
}

async fn remove_track(
    State(state): State<AppState>,
    PathParams((branch_id, track_id)): PathParams<(i32, i32)>,
) -> Result<Envelope<()>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while removing track from branch")
            .not_found(NOT_FOUND);

    let result =
        procedures::call(&state, pair("sp_branch_track_delete", branch_id, track_id), CTX).await?;
    procedures::ensure_accepted(procedures::require_row(&result)?, CTX)?;

    Ok(Envelope::message("Track removed from branch successfully"))
}

async fn list_relations(
    State(state): State<AppState>,
) -> Result<Envelope<Vec<BranchTrack>>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while fetching branch-track relations");

    let result =
        procedures::call(&state, ProcedureCall::new("sp_branch_track_select"), CTX).await?;
    Ok(Envelope::list(result.recordset().iter().map(BranchTrack::from_row).collect()))
}

async fn get_relation(
    State(state): State<AppState>,
    PathParams((branch_id, track_id)): PathParams<(i32, i32)>,
) -> Result<Envelope<BranchTrack>, ApiError> {
    const CTX: CallContext =
        CallContext::new("An error occurred while fetching branch-track relation")
            .not_found(NOT_FOUND);

    let result =
        procedures::call(&state, pair("sp_branch_track_selectbypk", branch_id, track_id), CTX)
            .await?;
    let row = result.first_row().ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    procedures::ensure_accepted(row, CTX)?;

    Ok(Envelope::data(BranchTrack::from_row(row)))
}
