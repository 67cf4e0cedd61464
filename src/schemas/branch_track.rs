use serde::{Deserialize, Serialize};

use crate::db::Row;
use crate::schemas::lenient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssignTrackRequest {
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) branch_id: Option<i32>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) track_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MoveTrackRequest {
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) new_branch_id: Option<i32>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) new_track_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BranchTrack {
    pub(crate) branch_id: Option<i64>,
    pub(crate) track_id: Option<i64>,
}

impl BranchTrack {
    pub(crate) fn from_row(row: &Row) -> Self {
        Self { branch_id: row.int("br_id"), track_id: row.int("tr_id") }
    }

    pub(crate) fn new(branch_id: i32, track_id: i32) -> Self {
        Self { branch_id: Some(i64::from(branch_id)), track_id: Some(i64::from(track_id)) }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BranchTrackMove {
    pub(crate) old_branch_id: i32,
    pub(crate) old_track_id: i32,
    pub(crate) new_branch_id: i32,
    pub(crate) new_track_id: i32,
}
