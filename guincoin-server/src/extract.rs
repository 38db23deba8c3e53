//! Extractors whose rejections leave as `{ "error": ... }` bodies

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON request body
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Path parameters
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);
