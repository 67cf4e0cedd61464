use axum::extract::{FromRequest, FromRequestParts};

use crate::api::errors::ApiError;

/// `Json` whose rejections render as the API's error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub(crate) struct JsonBody<T>(pub(crate) T);

/// `Path` whose rejections render as the API's error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub(crate) struct PathParams<T>(pub(crate) T);
