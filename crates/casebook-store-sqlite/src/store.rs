//! [`SqliteStore`]: the SQLite implementation of [`CaseStore`] and
//! [`AssignmentStore`].

use std::path::Path;

use casebook_core::{
  assignment::{AcceptanceState, AssignmentEpoch, DeclineReason},
  case::{CaseContent, CaseRecord, CaseStatus, NewCase},
  store::{AssignmentStore, CaseStore, Conditional, FollowUp},
};
use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    CASE_COLUMNS, EPOCH_COLUMNS, RawCase, RawEpoch, decode_dt, decode_epoch_state,
    decode_uuid, encode_dt, encode_status, encode_uuid, status_list,
  },
  schema::SCHEMA,
};

/// Statuses no conditional update may ever match, whatever the caller asks.
const FROZEN: &str = "'released', 'closed'";

/// A record with an immutable child has been released and is retired.
const NOT_RETIRED: &str = "NOT EXISTS (
         SELECT 1 FROM cases AS child
         WHERE child.parent_id = cases.case_id AND child.status IN ('released', 'closed'))";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Casebook store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// All follow-ups scheduled for a lineage, earliest first.
  pub async fn follow_ups(&self, lineage_id: Uuid) -> Result<Vec<FollowUp>> {
    let id_str = encode_uuid(lineage_id);

    let raws: Vec<(String, String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT lineage_id, snapshot_id, due_at FROM follow_ups
           WHERE lineage_id = ?1 ORDER BY due_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(lineage_id, snapshot_id, due_at)| {
        Ok(FollowUp {
          lineage_id:  decode_uuid(&lineage_id)?,
          snapshot_id: decode_uuid(&snapshot_id)?,
          due_at:      decode_dt(&due_at)?,
        })
      })
      .collect()
  }

  /// Execute raw SQL, bypassing every guard in this module.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str, id: Uuid) -> Result<usize> {
    let id_str = encode_uuid(id);
    Ok(
      self
        .conn
        .call(move |conn| Ok(conn.execute(sql, rusqlite::params![id_str])?))
        .await?,
    )
  }

  /// Run a `SELECT` over [`CASE_COLUMNS`] with `values` bound as `?1..`.
  async fn select_cases(&self, sql: String, values: Vec<String>) -> Result<Vec<CaseRecord>> {
    let raws: Vec<RawCase> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(values.iter()), RawCase::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCase::into_record).collect()
  }

  /// Run a conditional `UPDATE` that binds the case id as `?1` and `values`
  /// as `?2..`, then read the row back.
  ///
  /// Zero affected rows means the precondition failed; the row's current
  /// status is reported in the conflict.
  async fn conditional_update(
    &self,
    id: Uuid,
    sql: String,
    values: Vec<String>,
  ) -> Result<Conditional> {
    let id_str = encode_uuid(id);

    let (changed, raw): (usize, Option<RawCase>) = self
      .conn
      .call(move |conn| {
        let params = std::iter::once(&id_str).chain(values.iter());
        let changed = conn.execute(&sql, rusqlite::params_from_iter(params))?;
        let raw = select_case(conn, &id_str)?;
        Ok((changed, raw))
      })
      .await?;

    let record = raw.map(RawCase::into_record).transpose()?;
    Ok(match (changed, record) {
      (0, record) => Conditional::Conflict { current: record.map(|r| r.status) },
      (_, Some(record)) => Conditional::Applied(record),
      (_, None) => Conditional::Conflict { current: None },
    })
  }

  async fn epoch_by_id(&self, epoch_id: Uuid) -> Result<Option<AssignmentEpoch>> {
    let id_str = encode_uuid(epoch_id);

    let raw: Option<RawEpoch> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {EPOCH_COLUMNS} FROM assignment_epochs WHERE epoch_id = ?1"),
              rusqlite::params![id_str],
              RawEpoch::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEpoch::into_epoch).transpose()
  }

  /// Move a pending epoch to `state`, failing if it is not pending for this
  /// reviewer on this case.
  async fn decide_epoch(
    &self,
    case_id: Uuid,
    reviewer_id: Uuid,
    epoch_id: Uuid,
    state: &'static str,
    decline: Option<(DeclineReason, Option<String>)>,
  ) -> Result<AssignmentEpoch> {
    let epoch_str    = encode_uuid(epoch_id);
    let case_str     = encode_uuid(case_id);
    let reviewer_str = encode_uuid(reviewer_id);
    let at_str       = encode_dt(Utc::now());
    let reason       = decline.as_ref().map(|(r, _)| r.as_str());
    let text         = decline.and_then(|(_, t)| t);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE assignment_epochs
           SET state = ?4, decided_at = ?5, decline_reason = ?6, decline_text = ?7
           WHERE epoch_id = ?1 AND case_id = ?2 AND reviewer_id = ?3
             AND state = 'pending'",
          rusqlite::params![epoch_str, case_str, reviewer_str, state, at_str, reason, text],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::EpochNotPending(epoch_id));
    }
    self.epoch_by_id(epoch_id).await?.ok_or(Error::EpochNotPending(epoch_id))
  }
}

fn select_case(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawCase>> {
  conn
    .query_row(
      &format!("SELECT {CASE_COLUMNS} FROM cases WHERE case_id = ?1"),
      rusqlite::params![id],
      RawCase::from_row,
    )
    .optional()
}

// ─── CaseStore impl ──────────────────────────────────────────────────────────

impl CaseStore for SqliteStore {
  type Error = Error;

  // ── Records ───────────────────────────────────────────────────────────────

  async fn insert(&self, case: NewCase) -> Result<CaseRecord> {
    let id  = Uuid::new_v4();
    let now = Utc::now();

    let id_str          = encode_uuid(id);
    let lineage_str     = encode_uuid(case.lineage_id.unwrap_or(id));
    let parent_str      = case.parent_id.map(encode_uuid);
    let status_str      = encode_status(case.status);
    let released_at_str = case.released_at.map(encode_dt);
    let released_by_str = case.released_by.map(encode_uuid);
    let content_str     = serde_json::to_string(&case.content)?;
    let now_str         = encode_dt(now);

    let raw: Option<RawCase> = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO cases (
             case_id, lineage_id, parent_id, status, released_at,
             released_by, content_json, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
          rusqlite::params![
            id_str,
            lineage_str,
            parent_str,
            status_str,
            released_at_str,
            released_by_str,
            content_str,
            now_str,
          ],
        )?;
        Ok(select_case(conn, &id_str)?)
      })
      .await?;

    raw.ok_or(Error::CaseNotFound(id))?.into_record()
  }

  async fn get_by_id(&self, id: Uuid) -> Result<Option<CaseRecord>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawCase> = self
      .conn
      .call(move |conn| Ok(select_case(conn, &id_str)?))
      .await?;

    raw.map(RawCase::into_record).transpose()
  }

  async fn list_by_lineage(&self, lineage_id: Uuid) -> Result<Vec<CaseRecord>> {
    self
      .select_cases(
        format!("SELECT {CASE_COLUMNS} FROM cases WHERE lineage_id = ?1 ORDER BY rowid"),
        vec![encode_uuid(lineage_id)],
      )
      .await
  }

  async fn list_children(&self, parent_id: Uuid) -> Result<Vec<CaseRecord>> {
    self
      .select_cases(
        format!("SELECT {CASE_COLUMNS} FROM cases WHERE parent_id = ?1 ORDER BY rowid"),
        vec![encode_uuid(parent_id)],
      )
      .await
  }

  // ── Conditional updates ───────────────────────────────────────────────────

  async fn update_status(
    &self,
    id: Uuid,
    from: &'static [CaseStatus],
    to: CaseStatus,
  ) -> Result<Conditional> {
    let sql = format!(
      "UPDATE cases SET status = ?2, updated_at = ?3
       WHERE case_id = ?1 AND status IN ({}) AND status NOT IN ({FROZEN})
         AND {NOT_RETIRED}",
      status_list(from)
    );
    self
      .conditional_update(id, sql, vec![encode_status(to).to_owned(), encode_dt(Utc::now())])
      .await
  }

  async fn update_content(
    &self,
    id: Uuid,
    from: &'static [CaseStatus],
    content: CaseContent,
  ) -> Result<Conditional> {
    let sql = format!(
      "UPDATE cases SET content_json = ?2, updated_at = ?3
       WHERE case_id = ?1 AND status IN ({}) AND status NOT IN ({FROZEN})
         AND {NOT_RETIRED}",
      status_list(from)
    );
    let content_str = serde_json::to_string(&content)?;
    self
      .conditional_update(id, sql, vec![content_str, encode_dt(Utc::now())])
      .await
  }

  async fn close(&self, id: Uuid) -> Result<Conditional> {
    self
      .conditional_update(
        id,
        "UPDATE cases SET status = 'closed', updated_at = ?2
         WHERE case_id = ?1 AND status = 'released'"
          .to_owned(),
        vec![encode_dt(Utc::now())],
      )
      .await
  }

  // ── Per-user pointers and scheduling ──────────────────────────────────────

  async fn set_active_case(&self, user_id: Uuid, case_id: Uuid) -> Result<()> {
    let user_str = encode_uuid(user_id);
    let case_str = encode_uuid(case_id);
    let at_str   = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO active_cases (user_id, case_id, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT (user_id) DO UPDATE
             SET case_id = excluded.case_id, updated_at = excluded.updated_at",
          rusqlite::params![user_str, case_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn active_case(&self, user_id: Uuid) -> Result<Option<Uuid>> {
    let user_str = encode_uuid(user_id);

    let case_str: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT case_id FROM active_cases WHERE user_id = ?1",
              rusqlite::params![user_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    case_str.as_deref().map(decode_uuid).transpose()
  }

  async fn schedule_follow_up(&self, follow_up: FollowUp) -> Result<()> {
    let id_str       = encode_uuid(Uuid::new_v4());
    let lineage_str  = encode_uuid(follow_up.lineage_id);
    let snapshot_str = encode_uuid(follow_up.snapshot_id);
    let due_str      = encode_dt(follow_up.due_at);
    let now_str      = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO follow_ups (follow_up_id, lineage_id, snapshot_id, due_at, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, lineage_str, snapshot_str, due_str, now_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── AssignmentStore impl ────────────────────────────────────────────────────

impl AssignmentStore for SqliteStore {
  async fn open_epoch(&self, case_id: Uuid, reviewer_id: Uuid) -> Result<AssignmentEpoch> {
    let epoch_id     = Uuid::new_v4();
    let epoch_str    = encode_uuid(epoch_id);
    let case_str     = encode_uuid(case_id);
    let reviewer_str = encode_uuid(reviewer_id);
    let at_str       = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO assignment_epochs (epoch_id, case_id, reviewer_id, state, opened_at)
           VALUES (?1, ?2, ?3, 'pending', ?4)",
          rusqlite::params![epoch_str, case_str, reviewer_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    self.epoch_by_id(epoch_id).await?.ok_or(Error::EpochNotPending(epoch_id))
  }

  async fn acceptance_state(&self, case_id: Uuid, reviewer_id: Uuid) -> Result<AcceptanceState> {
    let case_str     = encode_uuid(case_id);
    let reviewer_str = encode_uuid(reviewer_id);

    let latest: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT epoch_id, state FROM assignment_epochs
               WHERE case_id = ?1 AND reviewer_id = ?2
               ORDER BY rowid DESC LIMIT 1",
              rusqlite::params![case_str, reviewer_str],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    match latest {
      None => Ok(AcceptanceState::NONE),
      Some((epoch_id, state)) => Ok(AcceptanceState {
        state:    decode_epoch_state(&state)?,
        epoch_id: Some(decode_uuid(&epoch_id)?),
      }),
    }
  }

  async fn record_accept(
    &self,
    case_id: Uuid,
    reviewer_id: Uuid,
    epoch_id: Uuid,
  ) -> Result<AssignmentEpoch> {
    self.decide_epoch(case_id, reviewer_id, epoch_id, "accepted", None).await
  }

  async fn record_decline(
    &self,
    case_id: Uuid,
    reviewer_id: Uuid,
    epoch_id: Uuid,
    reason: DeclineReason,
    text: Option<String>,
  ) -> Result<AssignmentEpoch> {
    self
      .decide_epoch(case_id, reviewer_id, epoch_id, "declined", Some((reason, text)))
      .await
  }
}
