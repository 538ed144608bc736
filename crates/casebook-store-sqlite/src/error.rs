//! Error type for `casebook-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value outside its enumerated set.
  #[error("unknown {column} value: {value:?}")]
  UnknownValue { column: &'static str, value: String },

  #[error("case not found: {0}")]
  CaseNotFound(uuid::Uuid),

  /// Accept/decline against an epoch that is missing, belongs to someone
  /// else, or was already decided.
  #[error("assignment epoch {0} is not pending for this reviewer")]
  EpochNotPending(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
