//! Error types for `casebook-core`.
//!
//! Every variant belongs to exactly one [`ErrorKind`]. The kind decides how a
//! caller reacts: recoverable kinds are rejected before any store write, while
//! store and integrity failures may leave state that needs operator attention.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  assessment::Score,
  assignment::EpochState,
  case::CaseStatus,
  lifecycle::Transition,
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("case not found: {0}")]
  CaseNotFound(Uuid),

  #[error("cannot {transition} case {case_id} while it is {from}")]
  IllegalTransition {
    case_id:    Uuid,
    from:       CaseStatus,
    transition: Transition,
  },

  #[error("case {case_id} was already released as snapshot {snapshot_id}")]
  AlreadyReleased {
    case_id:         Uuid,
    snapshot_id:     Uuid,
    /// `None` when the earlier release never produced its continuation draft.
    continuation_id: Option<Uuid>,
  },

  #[error("snapshot {snapshot_id} already has a live continuation {continuation_id}")]
  ContinuationExists {
    snapshot_id:     Uuid,
    continuation_id: Uuid,
  },

  #[error("case {case_id} is {status} and cannot be modified")]
  Immutable { case_id: Uuid, status: CaseStatus },

  #[error("case {case_id} was superseded by snapshot {snapshot_id} and cannot be modified")]
  Retired { case_id: Uuid, snapshot_id: Uuid },

  #[error("reviewer {reviewer_id} has not accepted case {case_id} (epoch state: {state})")]
  AcceptanceRequired {
    case_id:     Uuid,
    reviewer_id: Uuid,
    state:       EpochState,
  },

  #[error("assignment epoch {epoch_id} is not the pending epoch (latest state: {state})")]
  EpochNotPending {
    epoch_id: Uuid,
    state:    EpochState,
  },

  #[error("score {attempted} for {item:?} exceeds the subject-reported ceiling of {ceiling}")]
  CeilingViolation {
    item:      String,
    attempted: Score,
    ceiling:   Score,
  },

  #[error("score for {item:?} cannot be cleared while a subject-reported score exists")]
  ClearWithBaseline { item: String },

  #[error("subject-reported score for {item:?} cannot be changed or removed")]
  BaselineChanged { item: String },

  #[error("severity score {0} is outside the {min}..={max} scale", min = Score::MIN, max = Score::MAX)]
  ScoreOutOfRange(u8),

  #[error("assessment cannot be saved: {}", describe_issues(.0))]
  RationaleRequired(Vec<ItemIssue>),

  #[error("data integrity violation: {0}")]
  IntegrityViolation(IntegrityIssue),

  #[error("snapshot {snapshot_id} was released without a usable continuation draft: {source}")]
  OrphanedSnapshot {
    snapshot_id: Uuid,
    #[source]
    source:      Box<Error>,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Wrap a backend error so it can cross the store trait boundary.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::CaseNotFound(_) => ErrorKind::NotFound,
      Self::IllegalTransition { .. }
      | Self::AlreadyReleased { .. }
      | Self::ContinuationExists { .. }
      | Self::EpochNotPending { .. } => ErrorKind::IllegalTransition,
      Self::Immutable { .. }
      | Self::Retired { .. }
      | Self::AcceptanceRequired { .. } => ErrorKind::GuardrailViolation,
      Self::CeilingViolation { .. }
      | Self::ClearWithBaseline { .. }
      | Self::BaselineChanged { .. }
      | Self::ScoreOutOfRange(_) => ErrorKind::CeilingViolation,
      Self::RationaleRequired(_) => ErrorKind::RationaleRequired,
      Self::IntegrityViolation(_) => ErrorKind::IntegrityViolation,
      Self::OrphanedSnapshot { source, .. } => match source.kind() {
        ErrorKind::IntegrityViolation => ErrorKind::IntegrityViolation,
        _ => ErrorKind::StoreFailure,
      },
      Self::Store(_) | Self::Serialization(_) => ErrorKind::StoreFailure,
    }
  }

  /// `true` if the operation was rejected before anything was written.
  pub fn is_recoverable(&self) -> bool { self.kind().is_recoverable() }
}

/// Coarse classification of [`Error`] used for propagation and transport
/// mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  NotFound,
  IllegalTransition,
  GuardrailViolation,
  CeilingViolation,
  RationaleRequired,
  IntegrityViolation,
  StoreFailure,
}

impl ErrorKind {
  pub fn is_recoverable(self) -> bool {
    matches!(
      self,
      Self::NotFound
        | Self::IllegalTransition
        | Self::GuardrailViolation
        | Self::CeilingViolation
        | Self::RationaleRequired
    )
  }
}

// ─── Assessment issues ───────────────────────────────────────────────────────

/// A single assessment item that blocks saving its enclosing document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ItemIssue {
  /// The reviewer lowered the subject's score without saying why.
  MissingRationale { item: String },
  /// No subject baseline exists, so the reviewer must pick a score.
  MissingReviewerScore { item: String },
  /// The reviewer score exceeds the ceiling and is not a frozen legacy value.
  AboveCeiling {
    item:    String,
    score:   Score,
    ceiling: Score,
  },
}

impl ItemIssue {
  pub fn item(&self) -> &str {
    match self {
      Self::MissingRationale { item }
      | Self::MissingReviewerScore { item }
      | Self::AboveCeiling { item, .. } => item,
    }
  }
}

impl std::fmt::Display for ItemIssue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::MissingRationale { item } => {
        write!(f, "{item:?} was lowered without a rationale")
      }
      Self::MissingReviewerScore { item } => {
        write!(f, "{item:?} has no subject score and needs a reviewer score")
      }
      Self::AboveCeiling { item, score, ceiling } => {
        write!(f, "{item:?} scored {score} above ceiling {ceiling}")
      }
    }
  }
}

fn describe_issues(issues: &[ItemIssue]) -> String {
  issues
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

// ─── Integrity issues ────────────────────────────────────────────────────────

/// A lineage state that normal operation never produces. These are surfaced,
/// never repaired automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IntegrityIssue {
  #[error("lineage {lineage_id} has {} live drafts: {candidates:?}", .candidates.len())]
  MultipleDrafts {
    lineage_id: Uuid,
    candidates: Vec<Uuid>,
  },

  #[error("snapshot {case_id} was persisted with status {found} instead of released")]
  SnapshotStatus { case_id: Uuid, found: CaseStatus },

  #[error("continuation {case_id} was persisted with immutable status {found}")]
  ContinuationImmutable { case_id: Uuid, found: CaseStatus },

  #[error("corrective update of continuation {case_id} failed (current status: {found:?})")]
  CorrectionFailed {
    case_id: Uuid,
    found:   Option<CaseStatus>,
  },
}

impl From<IntegrityIssue> for Error {
  fn from(issue: IntegrityIssue) -> Self { Self::IntegrityViolation(issue) }
}
