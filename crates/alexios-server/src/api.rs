//! Webhook handler for the voice platform.

use crate::dispatch::DispatchError;
use crate::AppState;
use alexios_types::{SkillRequest, SkillResponse};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Extension, Json},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
///
/// Error responses carry no body; details are only logged.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("method not allowed: {0}")]
    MethodNotAllowed(Method),
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("unprocessable request: {0}")]
    UnprocessableEntity(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnsupportedType(_) => ApiError::UnprocessableEntity(err.to_string()),
            DispatchError::InvalidTimezone(_) => ApiError::BadRequest(err.to_string()),
            DispatchError::Store { .. } | DispatchError::DeadlineExceeded { .. } => {
                ApiError::InternalServerError(err.to_string())
            }
        }
    }
}

/// Handler for the webhook route.
///
/// Accepts any method so that non-POST requests get an explicit 405 from
/// here rather than from the router. The body is decoded by hand: a body
/// that is not valid JSON for the envelope is a 400 regardless of the
/// `Content-Type` header, and so is a body that cannot be buffered
/// (corrupt gzip, over the size limit). Those rejections are caught here so
/// they answer with a bare status like every other error.
pub async fn webhook_handler(
    Extension(state): Extension<Arc<AppState>>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SkillResponse>, ApiError> {
    if method != Method::POST {
        tracing::debug!(%method, "got request with bad method");
        return Err(ApiError::MethodNotAllowed(method));
    }

    let body = body.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "cannot read request body");
        ApiError::BadRequest(rejection.body_text())
    })?;

    tracing::debug!("decoding request");
    let request: SkillRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "cannot decode request JSON body");
        ApiError::BadRequest(e.to_string())
    })?;

    let text = state.dispatcher.dispatch(&request).await?;

    tracing::debug!("sending HTTP 200 response");
    Ok(Json(SkillResponse::text(text)))
}
