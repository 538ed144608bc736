//! Handlers for reviewer assignment epochs.
//!
//! Epochs belong to a lineage; `{id}` may be any record of it.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/cases/{id}/epochs` | Body: `{"reviewer_id":"..."}`; returns 201 |
//! | `GET`  | `/cases/{id}/reviewers/{reviewer}/acceptance` | Latest epoch state |
//! | `POST` | `/cases/{id}/epochs/{epoch}/accept` | Acting reviewer accepts |
//! | `POST` | `/cases/{id}/epochs/{epoch}/decline` | Body: [`DeclineBody`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use casebook_core::{
  CaseEngine,
  assignment::{AcceptanceState, AssignmentEpoch, DeclineReason},
  case::Role,
  store::AssignmentStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{actor::ActingAs, error::ApiError};

type Engine<S> = State<Arc<CaseEngine<S>>>;

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub reviewer_id: Uuid,
}

/// `POST /cases/{id}/epochs`
pub async fn assign<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
  ActingAs(actor): ActingAs,
  Json(body): Json<AssignBody>,
) -> Result<impl IntoResponse, ApiError> {
  if actor.role != Role::CaseManager {
    return Err(ApiError::Forbidden("only a case manager can assign reviewers".into()));
  }
  let epoch = engine.assign_reviewer(id, body.reviewer_id).await?;
  Ok((StatusCode::CREATED, Json(epoch)))
}

/// `GET /cases/{id}/reviewers/{reviewer}/acceptance`
pub async fn acceptance<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path((id, reviewer_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AcceptanceState>, ApiError> {
  Ok(Json(engine.acceptance_state(id, reviewer_id).await?))
}

/// `POST /cases/{id}/epochs/{epoch}/accept`
pub async fn accept<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path((id, epoch_id)): Path<(Uuid, Uuid)>,
  ActingAs(actor): ActingAs,
) -> Result<Json<AssignmentEpoch>, ApiError> {
  Ok(Json(engine.accept_assignment(id, actor.id, epoch_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct DeclineBody {
  pub reason: DeclineReason,
  #[serde(default)]
  pub text:   Option<String>,
}

/// `POST /cases/{id}/epochs/{epoch}/decline`
pub async fn decline<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path((id, epoch_id)): Path<(Uuid, Uuid)>,
  ActingAs(actor): ActingAs,
  Json(body): Json<DeclineBody>,
) -> Result<Json<AssignmentEpoch>, ApiError> {
  let text = body.text.filter(|t| !t.trim().is_empty());
  Ok(Json(engine.decline_assignment(id, actor.id, epoch_id, body.reason, text).await?))
}
