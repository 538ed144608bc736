//! The `CaseStore` and `AssignmentStore` traits.
//!
//! The traits are implemented by storage backends (e.g.
//! `casebook-store-sqlite`). The [`CaseEngine`](crate::CaseEngine) and the
//! API layer depend on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  assignment::{AcceptanceState, AssignmentEpoch, DeclineReason},
  case::{CaseContent, CaseRecord, CaseStatus, NewCase},
};

/// Outcome of a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub enum Conditional {
  /// The precondition held; carries the record as now persisted.
  Applied(CaseRecord),
  /// The precondition did not hold. `current` is the record's status at the
  /// time of the attempt, or `None` if it does not exist.
  Conflict { current: Option<CaseStatus> },
}

/// A follow-up review scheduled after a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUp {
  pub lineage_id:  Uuid,
  pub snapshot_id: Uuid,
  pub due_at:      DateTime<Utc>,
}

// ─── Case store ──────────────────────────────────────────────────────────────

/// Abstraction over the table of case records.
///
/// Released and closed records are never deleted. Implementations must refuse
/// every conditional update against a record whose current status is
/// `released` or `closed`, whatever `from` says; the only write a snapshot
/// ever sees is [`CaseStore::close`].
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CaseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Records ───────────────────────────────────────────────────────────

  /// Persist a new record and return it as stored. The store assigns the
  /// id and timestamps.
  fn insert(
    &self,
    case: NewCase,
  ) -> impl Future<Output = Result<CaseRecord, Self::Error>> + Send + '_;

  /// Point read. Returns `None` if not found.
  fn get_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CaseRecord>, Self::Error>> + Send + '_;

  /// Every record of a lineage, by lineage id (the root record's id).
  fn list_by_lineage(
    &self,
    lineage_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CaseRecord>, Self::Error>> + Send + '_;

  /// Direct children of a record.
  fn list_children(
    &self,
    parent_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CaseRecord>, Self::Error>> + Send + '_;

  // ── Conditional updates ───────────────────────────────────────────────

  /// Set the status of `id` to `to` if its current status is one of `from`
  /// and it has no released or closed child.
  fn update_status(
    &self,
    id: Uuid,
    from: &'static [CaseStatus],
    to: CaseStatus,
  ) -> impl Future<Output = Result<Conditional, Self::Error>> + Send + '_;

  /// Replace the content of `id` if its current status is one of `from`
  /// and it has no released or closed child. The check and the write must be
  /// one atomic step.
  fn update_content(
    &self,
    id: Uuid,
    from: &'static [CaseStatus],
    content: CaseContent,
  ) -> impl Future<Output = Result<Conditional, Self::Error>> + Send + '_;

  /// Move a released record to closed, leaving everything else untouched.
  fn close(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Conditional, Self::Error>> + Send + '_;

  // ── Per-user pointers and scheduling ──────────────────────────────────

  /// Point `user_id`'s active case at `case_id`.
  fn set_active_case(
    &self,
    user_id: Uuid,
    case_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn active_case(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  fn schedule_follow_up(
    &self,
    follow_up: FollowUp,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Assignment store ────────────────────────────────────────────────────────

/// Abstraction over reviewer assignment epochs. `case_id` is always a
/// lineage id.
pub trait AssignmentStore: CaseStore {
  /// Record a new pending assignment event.
  fn open_epoch(
    &self,
    case_id: Uuid,
    reviewer_id: Uuid,
  ) -> impl Future<Output = Result<AssignmentEpoch, Self::Error>> + Send + '_;

  /// The state of the most recent epoch for this reviewer, or
  /// [`AcceptanceState::NONE`] if none exists.
  fn acceptance_state(
    &self,
    case_id: Uuid,
    reviewer_id: Uuid,
  ) -> impl Future<Output = Result<AcceptanceState, Self::Error>> + Send + '_;

  /// Accept a pending epoch.
  fn record_accept(
    &self,
    case_id: Uuid,
    reviewer_id: Uuid,
    epoch_id: Uuid,
  ) -> impl Future<Output = Result<AssignmentEpoch, Self::Error>> + Send + '_;

  /// Decline a pending epoch.
  fn record_decline(
    &self,
    case_id: Uuid,
    reviewer_id: Uuid,
    epoch_id: Uuid,
    reason: DeclineReason,
    text: Option<String>,
  ) -> impl Future<Output = Result<AssignmentEpoch, Self::Error>> + Send + '_;
}
