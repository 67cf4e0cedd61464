use serde::{Deserialize, Serialize};

use crate::db::types::Role;
use crate::db::Row;
use crate::schemas::lenient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentRegistration {
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) email: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) password: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) date_of_birth: Option<String>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub(crate) track_id: Option<i32>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InstructorRegistration {
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) email: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) password: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) date_of_birth: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) specialization: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) email: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangePasswordRequest {
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) current_password: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub(crate) new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserSummary {
    pub(crate) id: Option<i64>,
    pub(crate) name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) role: Role,
}

impl UserSummary {
    /// Reads the `user_id`, `full_name` and `email` columns that the
    /// registration and login routines return.
    pub(crate) fn from_row(row: &Row, role: Role) -> Self {
        Self {
            id: row.int("user_id"),
            name: row.text("full_name"),
            email: row.text("email"),
            role,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthPayload {
    pub(crate) token: String,
    pub(crate) user: UserSummary,
}
