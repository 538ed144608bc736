//! Extractor for the acting user, read from request headers.
//!
//! Callers identify themselves with `X-Actor-Id` (a UUID) and `X-Actor-Role`
//! (`case_manager` or `reviewer`). Verifying that claim is the job of whatever
//! sits in front of this router.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use casebook_core::case::{Actor, Role};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_ID: &str = "x-actor-id";
pub const ACTOR_ROLE: &str = "x-actor-role";

/// The actor performing the request.
pub struct ActingAs(pub Actor);

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
  let header = |name: &str| {
    headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .ok_or_else(|| ApiError::BadRequest(format!("missing {name} header")))
  };

  let id = Uuid::parse_str(header(ACTOR_ID)?)
    .map_err(|e| ApiError::BadRequest(format!("invalid {ACTOR_ID}: {e}")))?;
  let role = match header(ACTOR_ROLE)? {
    "case_manager" => Role::CaseManager,
    "reviewer" => Role::Reviewer,
    other => return Err(ApiError::BadRequest(format!("unknown role {other:?}"))),
  };
  Ok(Actor { id, role })
}

impl<T> FromRequestParts<T> for ActingAs
where
  T: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &T) -> Result<Self, Self::Rejection> {
    actor_from_headers(&parts.headers).map(ActingAs)
  }
}
