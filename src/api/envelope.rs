use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Success body shared by every endpoint: `{success, message?, count?, data?}`.
#[derive(Debug, Serialize)]
pub(crate) struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip)]
    status: StatusCode,
}

impl Envelope<()> {
    pub(crate) fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            count: None,
            data: None,
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> Envelope<T> {
    pub(crate) fn data(data: T) -> Self {
        Self { success: true, message: None, count: None, data: Some(data), status: StatusCode::OK }
    }

    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub(crate) fn created(mut self) -> Self {
        self.status = StatusCode::CREATED;
        self
    }

    pub(crate) fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl<T: Serialize> Envelope<Vec<T>> {
    pub(crate) fn list(items: Vec<T>) -> Self {
        let count = items.len();
        Self {
            success: true,
            message: None,
            count: Some(count),
            data: Some(items),
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_counts_items() {
        let body = serde_json::to_value(Envelope::list(vec![1, 2, 3])).unwrap();
        assert_eq!(body, json!({"success": true, "count": 3, "data": [1, 2, 3]}));
    }

    #[test]
    fn message_only_omits_data() {
        let body = serde_json::to_value(Envelope::message("Branch deleted successfully")).unwrap();
        assert_eq!(body, json!({"success": true, "message": "Branch deleted successfully"}));
    }

    #[test]
    fn created_sets_status() {
        let envelope = Envelope::data(json!({"id": 1})).with_message("Created").created();
        assert_eq!(envelope.into_response().status(), StatusCode::CREATED);
    }
}
