use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{header, request::Parts};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;

use crate::api::errors::ApiError;
use crate::core::security::{self, TokenError};
use crate::core::state::AppState;
use crate::db::types::Role;

/// Identity established by [`authenticate`] for the lifetime of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RequestIdentity {
    pub(crate) subject_id: i32,
    pub(crate) role: Role,
}

/// Roles a route admits.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AllowList(pub(crate) &'static [Role]);

pub(crate) const INSTRUCTOR_ONLY: AllowList = AllowList(&[Role::Instructor]);
pub(crate) const STUDENT_ONLY: AllowList = AllowList(&[Role::Student]);
pub(crate) const ANY_ROLE: AllowList = AllowList(&[Role::Instructor, Role::Student]);

impl AllowList {
    pub(crate) fn admits(self, role: Role) -> bool {
        self.0.contains(&role)
    }

    fn denial(self) -> String {
        let names = self.0.iter().map(|role| role.as_str()).collect::<Vec<_>>().join(", ");
        format!("Access denied. Only {names} can access this resource.")
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verifies the bearer token locally (no database access) and attaches the
/// decoded identity to the request.
pub(crate) async fn authenticate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let Some(token) = bearer_token(&parts) else {
        return ApiError::Unauthorized("Access denied. No token provided.").into_response();
    };

    let identity = match security::verify_token(token, state.settings()) {
        Ok(claims) => RequestIdentity { subject_id: claims.user_id, role: claims.role },
        Err(TokenError::Expired) => {
            return ApiError::Unauthorized("Token has expired. Please login again.")
                .into_response();
        }
        Err(TokenError::Invalid) => {
            return ApiError::Unauthorized("Invalid token. Please login again.").into_response();
        }
        Err(TokenError::Internal(reason)) => {
            return ApiError::Internal {
                message: "Authentication failed".to_string(),
                detail: Some(reason),
            }
            .into_response();
        }
    };

    parts.extensions.insert(identity);
    next.run(Request::from_parts(parts, body)).await
}

/// Admits the request only if the authenticated role is on `allowed`.
pub(crate) async fn authorize(
    State(allowed): State<AllowList>,
    request: Request,
    next: Next,
) -> Response {
    let Some(identity) = request.extensions().get::<RequestIdentity>().copied() else {
        tracing::error!(uri = %request.uri(), "Authorization ran without an authenticated identity");
        return ApiError::Unauthorized("User not authenticated").into_response();
    };

    if !allowed.admits(identity.role) {
        return ApiError::Forbidden(allowed.denial()).into_response();
    }

    next.run(request).await
}

/// Wraps one method route with a role check. Authentication must already
/// have run, so apply this beneath the router's `authenticate` layer.
pub(crate) fn restrict(
    allowed: AllowList,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(allowed, authorize))
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestIdentity>()
            .copied()
            .ok_or(ApiError::Unauthorized("User not authenticated"))
    }
}
