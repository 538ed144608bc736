//! Assignment epochs: discrete assignment events a reviewer must accept
//! before they may change a case.
//!
//! Epochs are keyed by lineage id, so acceptance carries over to every
//! continuation draft created by later releases.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of the latest assignment epoch for a reviewer on a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochState {
  Pending,
  Accepted,
  Declined,
  /// No assignment event exists at all. Treated as a hard failure.
  NoEpoch,
}

impl EpochState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Accepted => "accepted",
      Self::Declined => "declined",
      Self::NoEpoch => "no_epoch",
    }
  }
}

impl fmt::Display for EpochState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Result of an acceptance-state lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceState {
  pub state:    EpochState,
  /// `None` exactly when `state` is [`EpochState::NoEpoch`].
  pub epoch_id: Option<Uuid>,
}

impl AcceptanceState {
  pub const NONE: Self = Self { state: EpochState::NoEpoch, epoch_id: None };

  pub fn is_accepted(&self) -> bool { self.state == EpochState::Accepted }
}

/// Why a reviewer turned an assignment down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
  ConflictOfInterest,
  Capacity,
  OutsideExpertise,
  Other,
}

impl DeclineReason {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::ConflictOfInterest => "conflict_of_interest",
      Self::Capacity => "capacity",
      Self::OutsideExpertise => "outside_expertise",
      Self::Other => "other",
    }
  }

  pub fn from_code(code: &str) -> Option<Self> {
    match code {
      "conflict_of_interest" => Some(Self::ConflictOfInterest),
      "capacity" => Some(Self::Capacity),
      "outside_expertise" => Some(Self::OutsideExpertise),
      "other" => Some(Self::Other),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decline {
  pub reason: DeclineReason,
  pub text:   Option<String>,
}

/// A persisted assignment event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentEpoch {
  pub epoch_id:    Uuid,
  /// Lineage id of the assigned case.
  pub case_id:     Uuid,
  pub reviewer_id: Uuid,
  pub state:       EpochState,
  pub opened_at:   DateTime<Utc>,
  pub decided_at:  Option<DateTime<Utc>>,
  pub decline:     Option<Decline>,
}

impl AssignmentEpoch {
  pub fn acceptance(&self) -> AcceptanceState {
    AcceptanceState { state: self.state, epoch_id: Some(self.epoch_id) }
  }
}
