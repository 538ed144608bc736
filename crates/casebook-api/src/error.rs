//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use casebook_core::{Error, ErrorKind};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The acting role may not perform the operation.
  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error(transparent)]
  Case(#[from] Error),
}

/// HTTP status for each engine error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::IllegalTransition
    | ErrorKind::GuardrailViolation
    | ErrorKind::IntegrityViolation => StatusCode::CONFLICT,
    ErrorKind::CeilingViolation | ErrorKind::RationaleRequired => {
      StatusCode::UNPROCESSABLE_ENTITY
    }
    ErrorKind::StoreFailure => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::NotFound(m) => {
        (StatusCode::NOT_FOUND, json!({ "error": m, "kind": ErrorKind::NotFound }))
      }
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, json!({ "error": m, "kind": "bad_request" }))
      }
      ApiError::Forbidden(m) => {
        (StatusCode::FORBIDDEN, json!({ "error": m, "kind": ErrorKind::GuardrailViolation }))
      }
      ApiError::Case(e) => {
        let kind = e.kind();
        if kind == ErrorKind::StoreFailure || kind == ErrorKind::IntegrityViolation {
          error!(error = %e, ?kind, "request failed");
        }
        let mut body = json!({ "error": e.to_string(), "kind": kind });
        if let Error::RationaleRequired(issues) = e {
          body["issues"] = json!(issues);
        }
        (status_for(kind), body)
      }
    };
    (status, Json(body)).into_response()
  }
}
