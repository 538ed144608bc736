//! JSON REST API for Casebook.
//!
//! Exposes an axum [`Router`] backed by a [`CaseEngine`] over any
//! [`AssignmentStore`]. Authentication, TLS, and transport concerns are the
//! caller's responsibility; the acting user is taken from the `X-Actor-Id`
//! and `X-Actor-Role` headers.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", casebook_api::api_router(engine.clone()))
//! ```

pub mod actor;
pub mod assignments;
pub mod cases;
pub mod error;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use casebook_core::{CaseEngine, store::AssignmentStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<CaseEngine<S>>) -> Router<()>
where
  S: AssignmentStore + 'static,
{
  Router::new()
    // Cases
    .route("/cases", post(cases::create::<S>))
    .route("/cases/{id}", get(cases::get_one::<S>))
    .route("/cases/{id}/content", put(cases::put_content::<S>))
    .route("/cases/{id}/assessments", put(cases::put_assessments::<S>))
    .route("/cases/{id}/ready", post(cases::mark_ready::<S>))
    .route("/cases/{id}/release", post(cases::release::<S>))
    .route("/cases/{id}/revisions", post(cases::create_revision::<S>))
    .route("/cases/{id}/close", post(cases::close::<S>))
    .route("/cases/{id}/lineage", get(cases::lineage::<S>))
    .route("/cases/{id}/guardrails", get(cases::guardrails::<S>))
    // Assignment
    .route("/cases/{id}/epochs", post(assignments::assign::<S>))
    .route(
      "/cases/{id}/reviewers/{reviewer}/acceptance",
      get(assignments::acceptance::<S>),
    )
    .route("/cases/{id}/epochs/{epoch}/accept", post(assignments::accept::<S>))
    .route("/cases/{id}/epochs/{epoch}/decline", post(assignments::decline::<S>))
    // Users
    .route("/users/{id}/active-case", get(cases::active_case::<S>))
    .with_state(engine)
}

// ─── Integration tests ────────────────────────────────────────────────────────
