use serde::{Deserialize, Serialize};

use crate::db::Row;
use crate::schemas::lenient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrackRequest {
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) name: Option<String>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) manager_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrackCreated {
    pub(crate) id: Option<i64>,
    pub(crate) name: Option<String>,
    pub(crate) manager_id: Option<i64>,
}

impl TrackCreated {
    pub(crate) fn from_row(row: &Row) -> Self {
        Self { id: row.int("tr_id"), name: row.text("tr_name"), manager_id: row.int("manager_id") }
    }
}

/// Echo of an update; fields the caller left out are omitted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrackChange {
    pub(crate) id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) manager_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrackResponse {
    pub(crate) id: Option<i64>,
    pub(crate) name: Option<String>,
    pub(crate) manager_id: Option<i64>,
    pub(crate) manager_name: Option<String>,
    pub(crate) manager_email: Option<String>,
}

impl TrackResponse {
    pub(crate) fn from_row(row: &Row) -> Self {
        Self {
            id: row.int("tr_id"),
            name: row.text("tr_name"),
            manager_id: row.int("manager_id"),
            manager_name: row.text("manager_name").filter(|name| !name.is_empty()),
            manager_email: row.text("manager_email").filter(|email| !email.is_empty()),
        }
    }
}
