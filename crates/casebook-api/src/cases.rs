//! Handlers for `/cases` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/cases` | Body: [`CaseContent`]; returns 201 + root draft |
//! | `GET`  | `/cases/{id}` | 404 if not found |
//! | `PUT`  | `/cases/{id}/content` | Body: [`CaseContent`] |
//! | `PUT`  | `/cases/{id}/assessments` | Body: [`AssessmentDocument`] |
//! | `POST` | `/cases/{id}/ready` | `draft → ready` |
//! | `POST` | `/cases/{id}/release` | Returns 201 + [`ReleaseOutcome`] |
//! | `POST` | `/cases/{id}/revisions` | `{id}` must be a released snapshot |
//! | `POST` | `/cases/{id}/close` | `released → closed` |
//! | `GET`  | `/cases/{id}/lineage` | [`LineageView`] of the record's lineage |
//! | `GET`  | `/cases/{id}/guardrails` | What may currently be done |
//! | `GET`  | `/users/{id}/active-case` | 404 if the user has none |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use casebook_core::{
  CaseEngine,
  assessment::AssessmentDocument,
  case::{CaseContent, CaseRecord},
  chain::LineageView,
  guardrail::Guardrails,
  release::ReleaseOutcome,
  store::AssignmentStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{actor::ActingAs, error::ApiError};

type Engine<S> = State<Arc<CaseEngine<S>>>;

// ─── Intake and reads ─────────────────────────────────────────────────────────

/// `POST /cases`
pub async fn create<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  ActingAs(actor): ActingAs,
  Json(content): Json<CaseContent>,
) -> Result<impl IntoResponse, ApiError> {
  let record = engine.open_case(&actor, content).await?;
  Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /cases/{id}`
pub async fn get_one<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
) -> Result<Json<CaseRecord>, ApiError> {
  Ok(Json(engine.get_case(id).await?))
}

/// `GET /cases/{id}/lineage`
pub async fn lineage<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
) -> Result<Json<LineageView>, ApiError> {
  Ok(Json(engine.lineage_view(id).await?))
}

/// `GET /cases/{id}/guardrails`
pub async fn guardrails<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
) -> Result<Json<Guardrails>, ApiError> {
  Ok(Json(engine.guardrails(id).await?))
}

// ─── Editing ──────────────────────────────────────────────────────────────────

/// `PUT /cases/{id}/content`
pub async fn put_content<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
  ActingAs(actor): ActingAs,
  Json(content): Json<CaseContent>,
) -> Result<Json<CaseRecord>, ApiError> {
  Ok(Json(engine.save_content(id, &actor, content).await?))
}

/// `PUT /cases/{id}/assessments`
pub async fn put_assessments<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
  ActingAs(actor): ActingAs,
  Json(document): Json<AssessmentDocument>,
) -> Result<Json<CaseRecord>, ApiError> {
  Ok(Json(engine.save_assessments(id, &actor, document).await?))
}

// ─── Transitions ──────────────────────────────────────────────────────────────

/// `POST /cases/{id}/ready`
pub async fn mark_ready<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
  ActingAs(actor): ActingAs,
) -> Result<Json<CaseRecord>, ApiError> {
  Ok(Json(engine.mark_ready(id, &actor).await?))
}

/// `POST /cases/{id}/release`
pub async fn release<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
  ActingAs(actor): ActingAs,
) -> Result<(StatusCode, Json<ReleaseOutcome>), ApiError> {
  let outcome = engine.release(id, &actor).await?;
  Ok((StatusCode::CREATED, Json(outcome)))
}

/// `POST /cases/{id}/revisions`
pub async fn create_revision<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
  ActingAs(actor): ActingAs,
) -> Result<impl IntoResponse, ApiError> {
  let continuation = engine.create_revision_from_snapshot(id, &actor).await?;
  Ok((StatusCode::CREATED, Json(continuation)))
}

/// `POST /cases/{id}/close`
pub async fn close<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
  ActingAs(actor): ActingAs,
) -> Result<Json<CaseRecord>, ApiError> {
  Ok(Json(engine.close_case(id, &actor).await?))
}

// ─── Users ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ActiveCase {
  pub user_id: Uuid,
  pub case_id: Uuid,
}

/// `GET /users/{id}/active-case`
pub async fn active_case<S: AssignmentStore + 'static>(
  State(engine): Engine<S>,
  Path(user_id): Path<Uuid>,
) -> Result<Json<ActiveCase>, ApiError> {
  let case_id = engine
    .active_case(user_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("user {user_id} has no active case")))?;
  Ok(Json(ActiveCase { user_id, case_id }))
}
