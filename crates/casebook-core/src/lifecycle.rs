//! The case state machine.
//!
//! ```text
//!            mark ready              release
//!   Draft ─────────────▶ Ready ──────────────▶ Released ──close──▶ Closed
//!     ▲                                           │
//!     └────────────── create revision ────────────┘
//! ```
//!
//! `release` and `create revision` do not change the status of the record
//! they act on. Both insert new records; the edges describe the status of the
//! record that results. [`TRANSITIONS`] is the authoritative table.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, case::CaseStatus};

/// An operation that moves a case through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
  /// Change content in place.
  Edit,
  MarkReady,
  /// Snapshot a ready record into a new released record.
  Release,
  /// Start a new draft from a released record.
  CreateRevision,
  Close,
}

impl Transition {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Edit => "edit",
      Self::MarkReady => "mark ready",
      Self::Release => "release",
      Self::CreateRevision => "create a revision of",
      Self::Close => "close",
    }
  }
}

impl fmt::Display for Transition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Every legal `(from, transition, to)` edge.
pub const TRANSITIONS: &[(CaseStatus, Transition, CaseStatus)] = &[
  (CaseStatus::Draft, Transition::Edit, CaseStatus::Draft),
  (CaseStatus::Ready, Transition::Edit, CaseStatus::Ready),
  (CaseStatus::Draft, Transition::MarkReady, CaseStatus::Ready),
  (CaseStatus::Ready, Transition::MarkReady, CaseStatus::Ready),
  (CaseStatus::Ready, Transition::Release, CaseStatus::Released),
  (CaseStatus::Released, Transition::CreateRevision, CaseStatus::Draft),
  (CaseStatus::Released, Transition::Close, CaseStatus::Closed),
];

/// The status `transition` leads to from `from`, if the edge exists.
pub fn target(from: CaseStatus, transition: Transition) -> Option<CaseStatus> {
  TRANSITIONS
    .iter()
    .find(|(f, t, _)| *f == from && *t == transition)
    .map(|(_, _, to)| *to)
}

pub fn is_allowed(from: CaseStatus, transition: Transition) -> bool {
  target(from, transition).is_some()
}

/// Like [`target`], failing with [`Error::IllegalTransition`] for a missing
/// edge.
pub fn next_status(
  case_id: Uuid,
  from: CaseStatus,
  transition: Transition,
) -> Result<CaseStatus> {
  target(from, transition).ok_or(Error::IllegalTransition { case_id, from, transition })
}

/// Statuses from which `transition` is legal.
pub fn sources(transition: Transition) -> Vec<CaseStatus> {
  TRANSITIONS
    .iter()
    .filter(|(_, t, _)| *t == transition)
    .map(|(from, _, _)| *from)
    .collect()
}
