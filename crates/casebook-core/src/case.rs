//! Case records: the versioned unit shared between case managers and
//! reviewers.
//!
//! A lineage is a forward chain of records linked by `parent_id`. Editable
//! records (`draft`, `ready`) are worked on in place; every release inserts a
//! new immutable snapshot and a fresh editable continuation behind it.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assessment::{AssessmentDocument, AssessmentSummary};

// ─── Status ──────────────────────────────────────────────────────────────────

/// The lifecycle status of a case record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
  /// Editable, work in progress.
  Draft,
  /// Editable, marked complete and waiting for release.
  Ready,
  /// Immutable snapshot visible to the external reviewer.
  Released,
  /// Immutable and terminal.
  Closed,
}

impl CaseStatus {
  pub const ALL: [Self; 4] =
    [Self::Draft, Self::Ready, Self::Released, Self::Closed];
  pub const EDITABLE: &'static [Self] = &[Self::Draft, Self::Ready];
  pub const IMMUTABLE: &'static [Self] = &[Self::Released, Self::Closed];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::Ready => "ready",
      Self::Released => "released",
      Self::Closed => "closed",
    }
  }

  /// Parse a status label, accepting the editable sub-labels shown in the
  /// UI (`working`, `revised`, `in_progress`) as [`CaseStatus::Draft`].
  pub fn from_label(label: &str) -> Option<Self> {
    match label.trim().to_ascii_lowercase().as_str() {
      "draft" | "working" | "revised" | "in_progress" => Some(Self::Draft),
      "ready" => Some(Self::Ready),
      "released" => Some(Self::Released),
      "closed" => Some(Self::Closed),
      _ => None,
    }
  }
}

impl fmt::Display for CaseStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown case status label: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for CaseStatus {
  type Err = UnknownStatus;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::from_label(s).ok_or_else(|| UnknownStatus(s.to_owned()))
  }
}

// ─── Actors ──────────────────────────────────────────────────────────────────

/// The two parties that work on a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  /// The nurse case manager who drafts and releases the record.
  CaseManager,
  /// The external attorney reviewing released snapshots.
  Reviewer,
}

/// Whoever is performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub id:   Uuid,
  pub role: Role,
}

impl Actor {
  pub fn case_manager(id: Uuid) -> Self { Self { id, role: Role::CaseManager } }

  pub fn reviewer(id: Uuid) -> Self { Self { id, role: Role::Reviewer } }
}

// ─── Content ─────────────────────────────────────────────────────────────────

/// A reference to a party involved in the case (claimant, insurer, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
  pub role:      String,
  pub name:      String,
  /// Identifier in an external system, if any.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reference: Option<String>,
}

/// Metadata stamped onto a snapshot at release time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseStamp {
  /// Monotonically increasing within a lineage, starting at 1.
  pub counter:     u32,
  pub released_at: DateTime<Utc>,
  pub released_by: Uuid,
  pub summary:     AssessmentSummary,
}

/// The case payload. The lifecycle engine copies it wholesale and never diffs
/// it; only `assessments` and `release` carry meaning for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseContent {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub case_type:             Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub incident_date:         Option<NaiveDate>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub jurisdiction:          Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assigned_case_manager: Option<Uuid>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assigned_reviewer:     Option<Uuid>,
  #[serde(default)]
  pub parties:               Vec<PartyRef>,
  #[serde(default)]
  pub assessments:           AssessmentDocument,
  /// Stamp of the most recent release this content was part of.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub release:               Option<ReleaseStamp>,
  /// Any further intake fields, carried through untouched.
  #[serde(flatten)]
  pub extra:                 serde_json::Map<String, serde_json::Value>,
}

impl CaseContent {
  pub fn release_counter(&self) -> u32 {
    self.release.as_ref().map_or(0, |stamp| stamp.counter)
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A persisted case record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
  pub id:          Uuid,
  /// Id of the first record in this lineage; equal to `id` for a root.
  pub lineage_id:  Uuid,
  pub parent_id:   Option<Uuid>,
  pub status:      CaseStatus,
  pub released_at: Option<DateTime<Utc>>,
  pub released_by: Option<Uuid>,
  pub content:     CaseContent,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

impl CaseRecord {
  pub fn is_root(&self) -> bool { self.parent_id.is_none() }

  /// The label shown to users. Editable records are split into `working`
  /// (never released) and `revised` (continuing from a snapshot).
  pub fn display_label(&self) -> &'static str {
    match self.status {
      CaseStatus::Draft if self.is_root() => "working",
      CaseStatus::Draft => "revised",
      other => other.as_str(),
    }
  }

  /// `released_at`/`released_by` are set exactly when the record is a
  /// snapshot.
  pub fn release_fields_consistent(&self) -> bool {
    let immutable = CaseStatus::IMMUTABLE.contains(&self.status);
    immutable == (self.released_at.is_some() && self.released_by.is_some())
      && (self.released_at.is_some() == self.released_by.is_some())
  }
}

/// Input to [`CaseStore::insert`](crate::store::CaseStore::insert).
///
/// The store assigns `id`, `created_at` and `updated_at`; a `lineage_id` of
/// `None` starts a new lineage rooted at the inserted record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCase {
  pub lineage_id:  Option<Uuid>,
  pub parent_id:   Option<Uuid>,
  pub status:      CaseStatus,
  pub released_at: Option<DateTime<Utc>>,
  pub released_by: Option<Uuid>,
  pub content:     CaseContent,
}

impl NewCase {
  /// A fresh root draft, as produced by intake.
  pub fn intake(content: CaseContent) -> Self {
    Self {
      lineage_id: None,
      parent_id: None,
      status: CaseStatus::Draft,
      released_at: None,
      released_by: None,
      content,
    }
  }

  /// Copy every inheritable field of `source`. Identity and timestamps
  /// (`id`, `created_at`, `updated_at`) are never part of a [`NewCase`], so
  /// they cannot be carried over.
  ///
  /// The copy is faithful: lifecycle fields come across exactly as they are
  /// on `source`, including an immutable status. Callers must follow up with
  /// one of the forcing transforms before inserting.
  pub fn copied_from(source: &CaseRecord) -> Self {
    Self {
      lineage_id:  Some(source.lineage_id),
      parent_id:   source.parent_id,
      status:      source.status,
      released_at: source.released_at,
      released_by: source.released_by,
      content:     source.content.clone(),
    }
  }

  /// Force the lifecycle fields of a continuation draft behind `snapshot`.
  ///
  /// Overrides, in order: `status = draft`, `released_at = None`,
  /// `released_by = None`, `parent_id = snapshot.id`,
  /// `lineage_id = snapshot.lineage_id`. Content is left as copied.
  pub fn force_continuation_of(mut self, snapshot: &CaseRecord) -> Self {
    self.status = CaseStatus::Draft;
    self.released_at = None;
    self.released_by = None;
    self.parent_id = Some(snapshot.id);
    self.lineage_id = Some(snapshot.lineage_id);
    self
  }

  /// The immutable snapshot of `source` carrying `content` as stamped at
  /// `released_at` by `released_by`.
  pub fn snapshot_of(
    source: &CaseRecord,
    content: CaseContent,
    released_at: DateTime<Utc>,
    released_by: Uuid,
  ) -> Self {
    Self {
      lineage_id: Some(source.lineage_id),
      parent_id: Some(source.id),
      status: CaseStatus::Released,
      released_at: Some(released_at),
      released_by: Some(released_by),
      content,
    }
  }
}
