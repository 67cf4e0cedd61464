use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub(crate) success: bool,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

/// Underlying cause carried on error responses. Only rendered into the body
/// when running in development.
#[derive(Debug, Clone)]
pub(crate) struct ErrorDetail {
    pub(crate) message: String,
    pub(crate) detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    Unauthorized(&'static str),
    Forbidden(String),
    NotFound(String),
    TooManyRequests(&'static str),
    ServiceUnavailable { message: String, detail: Option<String> },
    Internal { message: String, detail: Option<String> },
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal { message: context.to_string(), detail: Some(err.to_string()) }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, detail) = match self {
            Self::BadRequest(message) | Self::Forbidden(message) | Self::NotFound(message) => {
                (message, None)
            }
            Self::Unauthorized(message) | Self::TooManyRequests(message) => {
                (message.to_string(), None)
            }
            Self::ServiceUnavailable { message, detail } => {
                tracing::warn!(error = detail.as_deref().unwrap_or("-"), "{message}");
                (message, detail)
            }
            Self::Internal { message, detail } => {
                tracing::error!(error = detail.as_deref().unwrap_or("-"), "{message}");
                (message, detail)
            }
        };

        let body = ErrorBody { success: false, message: message.clone(), error: None };
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if let Some(detail) = detail {
            response.extensions_mut().insert(ErrorDetail { message, detail });
        }

        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        Self::BadRequest(match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Request body must be JSON (Content-Type: application/json)".to_string()
            }
            _ => "Invalid JSON request body".to_string(),
        })
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected path parameters");
        Self::BadRequest("Invalid path parameter".to_string())
    }
}
