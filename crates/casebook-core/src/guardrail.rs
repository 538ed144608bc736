//! Guardrails derived from a case's status and its reviewer assignment.
//!
//! The status predicates mirror the [state machine](crate::lifecycle); the
//! acceptance gate must pass before a reviewer changes anything.

use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  assignment::AcceptanceState,
  case::{Actor, CaseRecord, CaseStatus, Role},
  lifecycle::{self, Transition},
};

pub fn is_editable(status: CaseStatus) -> bool {
  lifecycle::is_allowed(status, Transition::Edit)
}

pub fn is_releasable(status: CaseStatus) -> bool {
  lifecycle::is_allowed(status, Transition::Release)
}

pub fn is_immutable(status: CaseStatus) -> bool { CaseStatus::IMMUTABLE.contains(&status) }

/// Fail with [`Error::Immutable`] unless `record` may be changed in place.
pub fn ensure_editable(record: &CaseRecord) -> Result<()> {
  if is_editable(record.status) {
    Ok(())
  } else {
    Err(Error::Immutable { case_id: record.id, status: record.status })
  }
}

/// Fail with [`Error::IllegalTransition`] unless `record` is ready to release.
pub fn ensure_releasable(record: &CaseRecord) -> Result<()> {
  lifecycle::next_status(record.id, record.status, Transition::Release).map(drop)
}

/// Whether `actor` must pass the acceptance gate before mutating a case.
pub fn requires_acceptance(actor: &Actor) -> bool { actor.role == Role::Reviewer }

/// The acceptance gate. `case_id` is the id the epoch is keyed by.
pub fn check_acceptance(
  case_id: Uuid,
  actor: &Actor,
  acceptance: &AcceptanceState,
) -> Result<()> {
  if !requires_acceptance(actor) || acceptance.is_accepted() {
    return Ok(());
  }
  Err(Error::AcceptanceRequired {
    case_id,
    reviewer_id: actor.id,
    state: acceptance.state,
  })
}

/// Read-side summary of what may be done with a case right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Guardrails {
  pub case_id:    Uuid,
  pub status:     CaseStatus,
  pub label:      &'static str,
  pub editable:   bool,
  pub releasable: bool,
  pub immutable:  bool,
  /// Set when an editable record already has a snapshot child.
  pub retired_by: Option<Uuid>,
}

impl Guardrails {
  pub fn for_record(record: &CaseRecord, retired_by: Option<Uuid>) -> Self {
    let live = retired_by.is_none();
    Self {
      case_id: record.id,
      status: record.status,
      label: record.display_label(),
      editable: live && is_editable(record.status),
      releasable: live && is_releasable(record.status),
      immutable: is_immutable(record.status),
      retired_by,
    }
  }
}
