use serde::{Deserialize, Serialize};

use crate::db::Row;
use crate::schemas::lenient;

#[derive(Debug, Deserialize)]
pub(crate) struct BranchRequest {
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BranchResponse {
    pub(crate) id: Option<i64>,
    pub(crate) name: Option<String>,
}

impl BranchResponse {
    pub(crate) fn from_row(row: &Row) -> Self {
        Self { id: row.int("br_id"), name: row.text("br_name") }
    }
}
