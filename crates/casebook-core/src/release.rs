//! The release transaction and its sibling, create-revision.
//!
//! A release turns a ready record into two new records:
//!
//! ```text
//!   R (ready) ◀── S (released, content stamped) ◀── D (draft, copy of R)
//! ```
//!
//! `S` and `D` are separate inserts with no transaction spanning them. If the
//! second insert fails, `S` is left as an orphaned snapshot: the resolver
//! reports it as awaiting continuation, and it is recovered with
//! [`CaseEngine::create_revision_from_snapshot`], never by re-running the
//! release.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  CaseEngine, Error, IntegrityIssue, Result,
  case::{Actor, CaseContent, CaseRecord, CaseStatus, NewCase, ReleaseStamp},
  guardrail,
  lifecycle::{self, Transition},
  store::{AssignmentStore, Conditional, FollowUp},
};

/// Statuses the corrective update may move a continuation away from.
const CORRECTABLE: &[CaseStatus] = &[CaseStatus::Ready];

/// Everything a successful release produced.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
  pub snapshot:       CaseRecord,
  pub continuation:   CaseRecord,
  /// The continuation came back with a wrong editable status and was forced
  /// back to draft.
  pub corrected:      bool,
  /// `None` if scheduling the follow-up failed.
  pub follow_up_due:  Option<DateTime<Utc>>,
}

/// Result of creating a continuation draft behind a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Continuation {
  pub draft:     CaseRecord,
  pub corrected: bool,
}

/// Stamp `content` for release number `counter`.
pub fn stamp(
  mut content: CaseContent,
  counter: u32,
  released_at: DateTime<Utc>,
  released_by: Uuid,
) -> CaseContent {
  let summary = content.assessments.summary();
  content.release = Some(ReleaseStamp { counter, released_at, released_by, summary });
  content
}

impl<S: AssignmentStore> CaseEngine<S> {
  /// Release a ready record.
  ///
  /// Fails without writing anything if the record is not ready, if it was
  /// already released, or if the acting reviewer has not accepted the case.
  pub async fn release(&self, id: Uuid, actor: &Actor) -> Result<ReleaseOutcome> {
    let record = self.load(id).await?;
    self.require_acceptance(&record, actor).await?;
    guardrail::ensure_releasable(&record)?;
    self.ensure_not_released(&record).await?;

    let counter = self.prior_counter(&record).await? + 1;

    // Optimistic concurrency: nothing is locked, so the record must still be
    // ready (and unreleased) right before the snapshot is written.
    let record = self.load(id).await?;
    guardrail::ensure_releasable(&record)?;
    self.ensure_not_released(&record).await?;

    let released_at = Utc::now();
    let content = stamp(record.content.clone(), counter, released_at, actor.id);

    let snapshot = self
      .store
      .insert(NewCase::snapshot_of(&record, content, released_at, actor.id))
      .await
      .map_err(Error::store)?;
    if snapshot.status != CaseStatus::Released {
      warn!(snapshot_id = %snapshot.id, status = %snapshot.status, "snapshot persisted with wrong status");
      return Err(
        IntegrityIssue::SnapshotStatus { case_id: snapshot.id, found: snapshot.status }.into(),
      );
    }
    info!(
      case_id = %record.id,
      snapshot_id = %snapshot.id,
      counter,
      actor = %actor.id,
      "released case"
    );

    // The continuation copies the record as it was before stamping.
    let continuation = self
      .continue_from(&record, &snapshot)
      .await
      .map_err(|source| Error::OrphanedSnapshot {
        snapshot_id: snapshot.id,
        source:      Box::new(source),
      })?;

    self
      .store
      .set_active_case(actor.id, continuation.draft.id)
      .await
      .map_err(Error::store)?;

    let follow_up_due = self.schedule_follow_up(&snapshot, released_at).await;

    Ok(ReleaseOutcome {
      snapshot,
      continuation: continuation.draft,
      corrected: continuation.corrected,
      follow_up_due,
    })
  }

  /// Start a new draft from any released record of a lineage, including one
  /// older than the latest. Also the recovery path for an orphaned snapshot.
  pub async fn create_revision_from_snapshot(
    &self,
    snapshot_id: Uuid,
    actor: &Actor,
  ) -> Result<Continuation> {
    let snapshot = self.load(snapshot_id).await?;
    self.require_acceptance(&snapshot, actor).await?;
    lifecycle::next_status(snapshot.id, snapshot.status, Transition::CreateRevision)?;

    let lineage = self.lineage_of(&snapshot).await?;
    if let Some(existing) = lineage.live_children_of(snapshot.id).first() {
      return Err(Error::ContinuationExists {
        snapshot_id:     snapshot.id,
        continuation_id: existing.id,
      });
    }

    let continuation = self.continue_from(&snapshot, &snapshot).await?;
    self
      .store
      .set_active_case(actor.id, continuation.draft.id)
      .await
      .map_err(Error::store)?;
    info!(
      snapshot_id = %snapshot.id,
      draft_id = %continuation.draft.id,
      actor = %actor.id,
      "created revision from snapshot"
    );
    Ok(continuation)
  }

  /// Reject a second release of `record`, naming what the first one left.
  async fn ensure_not_released(&self, record: &CaseRecord) -> Result<()> {
    let Some(snapshot) = self.snapshot_child(record.id).await? else {
      return Ok(());
    };
    let continuation_id = self
      .store
      .list_children(snapshot.id)
      .await
      .map_err(Error::store)?
      .into_iter()
      .find(|c| guardrail::is_editable(c.status))
      .map(|c| c.id);
    Err(Error::AlreadyReleased {
      case_id: record.id,
      snapshot_id: snapshot.id,
      continuation_id,
    })
  }

  /// The highest release counter anywhere in `record`'s lineage. A revision
  /// from an older snapshot copies an older count, so its own content and
  /// parent are not enough.
  async fn prior_counter(&self, record: &CaseRecord) -> Result<u32> {
    let lineage = self.lineage_of(record).await?;
    let highest = lineage
      .records()
      .iter()
      .filter(|r| guardrail::is_immutable(r.status))
      .map(|r| r.content.release_counter())
      .max()
      .unwrap_or(0);
    Ok(highest.max(record.content.release_counter()))
  }

  /// Insert the continuation draft of `snapshot`, copying content from
  /// `source`.
  async fn continue_from(
    &self,
    source: &CaseRecord,
    snapshot: &CaseRecord,
  ) -> Result<Continuation> {
    let draft = NewCase::copied_from(source).force_continuation_of(snapshot);
    let inserted = self.store.insert(draft).await.map_err(Error::store)?;
    let (draft, corrected) = self.verify_continuation(inserted).await?;
    Ok(Continuation { draft, corrected })
  }

  /// Make sure an inserted continuation really is a draft. A wrong editable
  /// status is forced back once; an immutable one is never touched.
  async fn verify_continuation(&self, inserted: CaseRecord) -> Result<(CaseRecord, bool)> {
    match inserted.status {
      CaseStatus::Draft => Ok((inserted, false)),
      found @ (CaseStatus::Released | CaseStatus::Closed) => {
        warn!(case_id = %inserted.id, status = %found, "continuation persisted as immutable");
        Err(IntegrityIssue::ContinuationImmutable { case_id: inserted.id, found }.into())
      }
      found => {
        warn!(case_id = %inserted.id, status = %found, "forcing continuation back to draft");
        match self
          .store
          .update_status(inserted.id, CORRECTABLE, CaseStatus::Draft)
          .await
          .map_err(Error::store)?
        {
          Conditional::Applied(fixed) if fixed.status == CaseStatus::Draft => Ok((fixed, true)),
          Conditional::Applied(fixed) => Err(
            IntegrityIssue::CorrectionFailed { case_id: fixed.id, found: Some(fixed.status) }
              .into(),
          ),
          Conditional::Conflict { current } => {
            Err(IntegrityIssue::CorrectionFailed { case_id: inserted.id, found: current }.into())
          }
        }
      }
    }
  }

  /// Best effort: a failure is logged and reported as `None`.
  async fn schedule_follow_up(
    &self,
    snapshot: &CaseRecord,
    released_at: DateTime<Utc>,
  ) -> Option<DateTime<Utc>> {
    let due_at = released_at + self.policy.follow_up_interval;
    let follow_up = FollowUp {
      lineage_id: snapshot.lineage_id,
      snapshot_id: snapshot.id,
      due_at,
    };
    match self.store.schedule_follow_up(follow_up).await {
      Ok(()) => Some(due_at),
      Err(err) => {
        warn!(snapshot_id = %snapshot.id, error = %err, "failed to schedule follow-up");
        None
      }
    }
  }
}
