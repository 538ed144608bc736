//! A [`SqliteStore`] wrapper that fails on command, for exercising the
//! partial-failure paths of release.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use casebook_core::{
  CaseEngine, Error, ErrorKind, IntegrityIssue, ReleasePolicy,
  assignment::{AcceptanceState, AssignmentEpoch, DeclineReason},
  case::{Actor, CaseContent, CaseRecord, CaseStatus, NewCase},
  release::stamp,
  store::{AssignmentStore, CaseStore, Conditional, FollowUp},
};
use chrono::Utc;
use uuid::Uuid;

use crate::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum FaultError {
  #[error(transparent)]
  Store(#[from] crate::Error),

  #[error("injected fault")]
  Injected,
}

/// One-shot faults. Each flag is cleared when it fires, except
/// `fail_follow_ups` and `conflict_updates`.
#[derive(Default)]
pub struct Faults {
  pub fail_continuation:  AtomicBool,
  pub ready_continuation: AtomicBool,
  pub misreport_snapshot: AtomicBool,
  pub conflict_updates:   AtomicBool,
  pub fail_follow_ups:    AtomicBool,
  /// Release the record right before a content write lands on it.
  pub release_mid_edit:   AtomicBool,
}

pub struct FaultyStore {
  inner:  SqliteStore,
  faults: Faults,
}

impl FaultyStore {
  pub async fn new() -> Self {
    Self {
      inner:  SqliteStore::open_in_memory().await.expect("in-memory store"),
      faults: Faults::default(),
    }
  }

  pub fn arm(&self, flag: impl Fn(&Faults) -> &AtomicBool) {
    flag(&self.faults).store(true, Ordering::SeqCst);
  }

  fn fire(flag: &AtomicBool) -> bool { flag.swap(false, Ordering::SeqCst) }
}

fn is_continuation(case: &NewCase) -> bool {
  case.status == CaseStatus::Draft && case.parent_id.is_some()
}

impl CaseStore for FaultyStore {
  type Error = FaultError;

  async fn insert(&self, mut case: NewCase) -> Result<CaseRecord, FaultError> {
    if is_continuation(&case) {
      if Self::fire(&self.faults.fail_continuation) {
        return Err(FaultError::Injected);
      }
      if Self::fire(&self.faults.ready_continuation) {
        case.status = CaseStatus::Ready;
      }
    }

    let mut record = self.inner.insert(case).await?;
    if record.status == CaseStatus::Released && Self::fire(&self.faults.misreport_snapshot) {
      record.status = CaseStatus::Draft;
    }
    Ok(record)
  }

  async fn get_by_id(&self, id: Uuid) -> Result<Option<CaseRecord>, FaultError> {
    Ok(self.inner.get_by_id(id).await?)
  }

  async fn list_by_lineage(&self, lineage_id: Uuid) -> Result<Vec<CaseRecord>, FaultError> {
    Ok(self.inner.list_by_lineage(lineage_id).await?)
  }

  async fn list_children(&self, parent_id: Uuid) -> Result<Vec<CaseRecord>, FaultError> {
    Ok(self.inner.list_children(parent_id).await?)
  }

  async fn update_status(
    &self,
    id: Uuid,
    from: &'static [CaseStatus],
    to: CaseStatus,
  ) -> Result<Conditional, FaultError> {
    if self.faults.conflict_updates.load(Ordering::SeqCst) {
      let current = self.inner.get_by_id(id).await?.map(|r| r.status);
      return Ok(Conditional::Conflict { current });
    }
    Ok(self.inner.update_status(id, from, to).await?)
  }

  async fn update_content(
    &self,
    id: Uuid,
    from: &'static [CaseStatus],
    content: CaseContent,
  ) -> Result<Conditional, FaultError> {
    if Self::fire(&self.faults.release_mid_edit)
      && let Some(record) = self.inner.get_by_id(id).await?
    {
      let now = Utc::now();
      let stamped = stamp(record.content.clone(), 1, now, Uuid::nil());
      self
        .inner
        .insert(NewCase::snapshot_of(&record, stamped, now, Uuid::nil()))
        .await?;
    }
    Ok(self.inner.update_content(id, from, content).await?)
  }

  async fn close(&self, id: Uuid) -> Result<Conditional, FaultError> {
    Ok(self.inner.close(id).await?)
  }

  async fn set_active_case(&self, user_id: Uuid, case_id: Uuid) -> Result<(), FaultError> {
    Ok(self.inner.set_active_case(user_id, case_id).await?)
  }

  async fn active_case(&self, user_id: Uuid) -> Result<Option<Uuid>, FaultError> {
    Ok(self.inner.active_case(user_id).await?)
  }

  async fn schedule_follow_up(&self, follow_up: FollowUp) -> Result<(), FaultError> {
    if self.faults.fail_follow_ups.load(Ordering::SeqCst) {
      return Err(FaultError::Injected);
    }
    Ok(self.inner.schedule_follow_up(follow_up).await?)
  }
}

impl AssignmentStore for FaultyStore {
  async fn open_epoch(
    &self,
    case_id: Uuid,
    reviewer_id: Uuid,
  ) -> Result<AssignmentEpoch, FaultError> {
    Ok(self.inner.open_epoch(case_id, reviewer_id).await?)
  }

  async fn acceptance_state(
    &self,
    case_id: Uuid,
    reviewer_id: Uuid,
  ) -> Result<AcceptanceState, FaultError> {
    Ok(self.inner.acceptance_state(case_id, reviewer_id).await?)
  }

  async fn record_accept(
    &self,
    case_id: Uuid,
    reviewer_id: Uuid,
    epoch_id: Uuid,
  ) -> Result<AssignmentEpoch, FaultError> {
    Ok(self.inner.record_accept(case_id, reviewer_id, epoch_id).await?)
  }

  async fn record_decline(
    &self,
    case_id: Uuid,
    reviewer_id: Uuid,
    epoch_id: Uuid,
    reason: DeclineReason,
    text: Option<String>,
  ) -> Result<AssignmentEpoch, FaultError> {
    Ok(self.inner.record_decline(case_id, reviewer_id, epoch_id, reason, text).await?)
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

async fn setup() -> (CaseEngine<FaultyStore>, Actor, CaseRecord) {
  let engine = CaseEngine::new(Arc::new(FaultyStore::new().await), ReleasePolicy::default());
  let actor = Actor::case_manager(Uuid::new_v4());
  let case = engine.open_case(&actor, CaseContent::default()).await.unwrap();
  let ready = engine.mark_ready(case.id, &actor).await.unwrap();
  (engine, actor, ready)
}

#[tokio::test]
async fn failed_continuation_leaves_recoverable_orphan() {
  let (engine, actor, ready) = setup().await;
  engine.store().arm(|f| &f.fail_continuation);

  let snapshot_id = match engine.release(ready.id, &actor).await {
    Err(Error::OrphanedSnapshot { snapshot_id, .. }) => snapshot_id,
    other => panic!("expected orphaned snapshot, got {other:?}"),
  };

  // Releasing the record again must not produce a second snapshot.
  let err = engine.release(ready.id, &actor).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyReleased { continuation_id: None, .. }));
  assert_eq!(err.kind(), ErrorKind::IllegalTransition);

  // The active pointer did not move.
  assert_eq!(engine.active_case(actor.id).await.unwrap(), Some(ready.id));

  let view = engine.lineage_view(ready.id).await.unwrap();
  assert!(view.awaiting_continuation);
  assert_eq!(view.latest_released.as_ref().map(|r| r.id), Some(snapshot_id));
  assert!(view.current_draft.is_none());

  let revision = engine
    .create_revision_from_snapshot(snapshot_id, &actor)
    .await
    .unwrap();
  assert_eq!(revision.draft.parent_id, Some(snapshot_id));
  assert_eq!(revision.draft.status, CaseStatus::Draft);

  let view = engine.lineage_view(ready.id).await.unwrap();
  assert!(!view.awaiting_continuation);
  assert_eq!(view.current_draft.map(|r| r.id), Some(revision.draft.id));
}

#[tokio::test]
async fn ready_continuation_is_forced_back_to_draft() {
  let (engine, actor, ready) = setup().await;
  engine.store().arm(|f| &f.ready_continuation);

  let outcome = engine.release(ready.id, &actor).await.unwrap();
  assert!(outcome.corrected);
  assert_eq!(outcome.continuation.status, CaseStatus::Draft);

  let stored = engine
    .store()
    .get_by_id(outcome.continuation.id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.status, CaseStatus::Draft);
}

#[tokio::test]
async fn misreported_snapshot_stops_before_continuation() {
  let (engine, actor, ready) = setup().await;
  engine.store().arm(|f| &f.misreport_snapshot);

  let err = engine.release(ready.id, &actor).await.unwrap_err();
  assert!(matches!(
    err,
    Error::IntegrityViolation(IntegrityIssue::SnapshotStatus { found: CaseStatus::Draft, .. })
  ));
  assert_eq!(err.kind(), ErrorKind::IntegrityViolation);

  let lineage = engine.lineage(ready.id).await.unwrap();
  let drafts = lineage.records().iter().filter(|r| r.status == CaseStatus::Draft).count();
  assert_eq!(drafts, 0);
}

#[tokio::test]
async fn failed_correction_is_an_integrity_violation() {
  let (engine, actor, ready) = setup().await;
  engine.store().arm(|f| &f.ready_continuation);
  engine.store().arm(|f| &f.conflict_updates);

  let err = engine.release(ready.id, &actor).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
  let Error::OrphanedSnapshot { source, .. } = err else {
    panic!("expected orphaned snapshot");
  };
  assert!(matches!(
    *source,
    Error::IntegrityViolation(IntegrityIssue::CorrectionFailed {
      found: Some(CaseStatus::Ready),
      ..
    })
  ));
}

#[tokio::test]
async fn follow_up_failure_does_not_fail_release() {
  let (engine, actor, ready) = setup().await;
  engine.store().arm(|f| &f.fail_follow_ups);

  let outcome = engine.release(ready.id, &actor).await.unwrap();
  assert!(outcome.follow_up_due.is_none());
  assert_eq!(outcome.continuation.status, CaseStatus::Draft);
}

#[tokio::test]
async fn edit_racing_a_release_is_refused() {
  let (engine, actor, ready) = setup().await;
  engine.store().arm(|f| &f.release_mid_edit);

  let content = CaseContent { jurisdiction: Some("CO".into()), ..ready.content.clone() };
  let err = engine.save_content(ready.id, &actor, content).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::GuardrailViolation);
  let snapshot_id = match err {
    Error::Retired { case_id, snapshot_id } if case_id == ready.id => snapshot_id,
    other => panic!("expected retired, got {other:?}"),
  };

  let stored = engine.store().get_by_id(ready.id).await.unwrap().unwrap();
  assert_eq!(stored.content, ready.content);
  let snapshot = engine.store().get_by_id(snapshot_id).await.unwrap().unwrap();
  assert_eq!(snapshot.content.jurisdiction, ready.content.jurisdiction);
}
