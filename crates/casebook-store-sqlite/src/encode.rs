//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Case content is stored as
//! compact JSON. UUIDs are stored as hyphenated lowercase strings.

use casebook_core::{
  assignment::{AssignmentEpoch, Decline, DeclineReason, EpochState},
  case::{CaseRecord, CaseStatus},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── CaseStatus ───────────────────────────────────────────────────────────────

pub fn encode_status(status: CaseStatus) -> &'static str { status.as_str() }

pub fn decode_status(s: &str) -> Result<CaseStatus> {
  match s {
    "draft" => Ok(CaseStatus::Draft),
    "ready" => Ok(CaseStatus::Ready),
    "released" => Ok(CaseStatus::Released),
    "closed" => Ok(CaseStatus::Closed),
    other => Err(Error::UnknownValue { column: "status", value: other.to_owned() }),
  }
}

/// `'draft', 'ready'`: a SQL list literal for an `IN (...)` clause. Only
/// ever built from the fixed status vocabulary.
pub fn status_list(statuses: &[CaseStatus]) -> String {
  statuses
    .iter()
    .map(|s| format!("'{}'", encode_status(*s)))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── EpochState ───────────────────────────────────────────────────────────────

pub fn decode_epoch_state(s: &str) -> Result<EpochState> {
  match s {
    "pending" => Ok(EpochState::Pending),
    "accepted" => Ok(EpochState::Accepted),
    "declined" => Ok(EpochState::Declined),
    other => Err(Error::UnknownValue { column: "state", value: other.to_owned() }),
  }
}

pub fn decode_decline_reason(s: &str) -> Result<DeclineReason> {
  DeclineReason::from_code(s)
    .ok_or_else(|| Error::UnknownValue { column: "decline_reason", value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const CASE_COLUMNS: &str = "case_id, lineage_id, parent_id, status, released_at, \
   released_by, content_json, created_at, updated_at";

/// Raw strings read directly from a `cases` row.
pub struct RawCase {
  pub case_id:      String,
  pub lineage_id:   String,
  pub parent_id:    Option<String>,
  pub status:       String,
  pub released_at:  Option<String>,
  pub released_by:  Option<String>,
  pub content_json: String,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawCase {
  /// Map a row selected with [`CASE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:      row.get(0)?,
      lineage_id:   row.get(1)?,
      parent_id:    row.get(2)?,
      status:       row.get(3)?,
      released_at:  row.get(4)?,
      released_by:  row.get(5)?,
      content_json: row.get(6)?,
      created_at:   row.get(7)?,
      updated_at:   row.get(8)?,
    })
  }

  pub fn into_record(self) -> Result<CaseRecord> {
    Ok(CaseRecord {
      id:          decode_uuid(&self.case_id)?,
      lineage_id:  decode_uuid(&self.lineage_id)?,
      parent_id:   self.parent_id.as_deref().map(decode_uuid).transpose()?,
      status:      decode_status(&self.status)?,
      released_at: self.released_at.as_deref().map(decode_dt).transpose()?,
      released_by: self.released_by.as_deref().map(decode_uuid).transpose()?,
      content:     serde_json::from_str(&self.content_json)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub const EPOCH_COLUMNS: &str = "epoch_id, case_id, reviewer_id, state, opened_at, \
   decided_at, decline_reason, decline_text";

/// Raw strings read directly from an `assignment_epochs` row.
pub struct RawEpoch {
  pub epoch_id:       String,
  pub case_id:        String,
  pub reviewer_id:    String,
  pub state:          String,
  pub opened_at:      String,
  pub decided_at:     Option<String>,
  pub decline_reason: Option<String>,
  pub decline_text:   Option<String>,
}

impl RawEpoch {
  /// Map a row selected with [`EPOCH_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      epoch_id:       row.get(0)?,
      case_id:        row.get(1)?,
      reviewer_id:    row.get(2)?,
      state:          row.get(3)?,
      opened_at:      row.get(4)?,
      decided_at:     row.get(5)?,
      decline_reason: row.get(6)?,
      decline_text:   row.get(7)?,
    })
  }

  pub fn into_epoch(self) -> Result<AssignmentEpoch> {
    let decline = self
      .decline_reason
      .as_deref()
      .map(decode_decline_reason)
      .transpose()?
      .map(|reason| Decline { reason, text: self.decline_text });

    Ok(AssignmentEpoch {
      epoch_id:    decode_uuid(&self.epoch_id)?,
      case_id:     decode_uuid(&self.case_id)?,
      reviewer_id: decode_uuid(&self.reviewer_id)?,
      state:       decode_epoch_state(&self.state)?,
      opened_at:   decode_dt(&self.opened_at)?,
      decided_at:  self.decided_at.as_deref().map(decode_dt).transpose()?,
      decline,
    })
  }
}
