//! Integration tests for `SqliteStore` and the lifecycle engine against an
//! in-memory database.

use std::sync::Arc;

use casebook_core::{
  CaseEngine, Error, ErrorKind, ReleasePolicy,
  assessment::{AssessmentDocument, AssessmentItem, Score},
  assignment::{DeclineReason, EpochState},
  case::{Actor, CaseContent, CaseRecord, CaseStatus, NewCase},
  ceiling,
  store::{AssignmentStore, CaseStore, Conditional},
};
use chrono::Duration;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn engine() -> CaseEngine<SqliteStore> {
  CaseEngine::new(Arc::new(store().await), ReleasePolicy::default())
}

fn score(v: u8) -> Score { Score::new(v).unwrap() }

fn intake_content() -> CaseContent {
  CaseContent {
    case_type: Some("personal_injury".into()),
    jurisdiction: Some("TX".into()),
    assessments: AssessmentDocument::new(vec![
      AssessmentItem::new("pain", "Pain level").with_subject_score(score(4)),
      AssessmentItem::new("sleep", "Sleep disruption").with_subject_score(score(3)),
    ]),
    ..CaseContent::default()
  }
}

async fn ready_case(engine: &CaseEngine<SqliteStore>, actor: &Actor) -> CaseRecord {
  let case = engine.open_case(actor, intake_content()).await.unwrap();
  engine.mark_ready(case.id, actor).await.unwrap()
}

async fn lineage_len(engine: &CaseEngine<SqliteStore>, id: Uuid) -> usize {
  engine.lineage(id).await.unwrap().records().len()
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_case() {
  let s = store().await;

  let case = s.insert(NewCase::intake(intake_content())).await.unwrap();
  assert_eq!(case.status, CaseStatus::Draft);
  assert_eq!(case.lineage_id, case.id);
  assert!(case.parent_id.is_none());

  let fetched = s.get_by_id(case.id).await.unwrap().unwrap();
  assert_eq!(fetched, case);
}

#[tokio::test]
async fn get_case_missing_returns_none() {
  let s = store().await;
  assert!(s.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn store_rejects_inconsistent_release_fields() {
  let s = store().await;
  let mut input = NewCase::intake(CaseContent::default());
  input.status = CaseStatus::Released;

  assert!(s.insert(input).await.is_err());
}

#[tokio::test]
async fn conditional_update_never_touches_snapshots() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;
  let outcome = e.release(ready.id, &actor).await.unwrap();

  // Even a caller that lists `released` as an allowed source is refused.
  let result = e
    .store()
    .update_status(outcome.snapshot.id, &CaseStatus::ALL, CaseStatus::Draft)
    .await
    .unwrap();
  assert_eq!(result, Conditional::Conflict { current: Some(CaseStatus::Released) });

  let result = e
    .store()
    .update_content(outcome.snapshot.id, &CaseStatus::ALL, CaseContent::default())
    .await
    .unwrap();
  assert_eq!(result, Conditional::Conflict { current: Some(CaseStatus::Released) });

  let unchanged = e.store().get_by_id(outcome.snapshot.id).await.unwrap().unwrap();
  assert_eq!(unchanged, outcome.snapshot);
}

#[tokio::test]
async fn database_refuses_raw_snapshot_writes() {
  let s = store().await;
  let e = CaseEngine::new(Arc::new(s.clone()), ReleasePolicy::default());
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;
  let outcome = e.release(ready.id, &actor).await.unwrap();
  let id = outcome.snapshot.id;

  for sql in [
    "UPDATE cases SET content_json = '{}' WHERE case_id = ?1",
    "UPDATE cases SET status = 'draft', released_at = NULL, released_by = NULL \
     WHERE case_id = ?1",
    "DELETE FROM cases WHERE case_id = ?1",
  ] {
    assert!(s.execute_raw(sql, id).await.is_err(), "{sql}");
  }

  // Closing is the one write a snapshot accepts.
  let changed = s
    .execute_raw("UPDATE cases SET status = 'closed' WHERE case_id = ?1", id)
    .await
    .unwrap();
  assert_eq!(changed, 1);
  assert!(s.execute_raw("UPDATE cases SET status = 'released' WHERE case_id = ?1", id).await.is_err());

  // Editable records are ordinary rows.
  let changed = s
    .execute_raw("UPDATE cases SET content_json = '{}' WHERE case_id = ?1", outcome.continuation.id)
    .await
    .unwrap();
  assert_eq!(changed, 1);
}

#[tokio::test]
async fn conditional_update_reports_missing_case() {
  let s = store().await;
  let result = s
    .update_status(Uuid::new_v4(), CaseStatus::EDITABLE, CaseStatus::Ready)
    .await
    .unwrap();
  assert_eq!(result, Conditional::Conflict { current: None });
}

#[tokio::test]
async fn second_snapshot_of_same_parent_is_refused() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;
  let outcome = e.release(ready.id, &actor).await.unwrap();

  let duplicate = NewCase::snapshot_of(
    &ready,
    outcome.snapshot.content.clone(),
    chrono::Utc::now(),
    actor.id,
  );
  assert!(e.store().insert(duplicate).await.is_err());
}

// ─── Assignment epochs ───────────────────────────────────────────────────────

#[tokio::test]
async fn epoch_lifecycle() {
  let s = store().await;
  let case_id = Uuid::new_v4();
  let reviewer = Uuid::new_v4();

  let none = s.acceptance_state(case_id, reviewer).await.unwrap();
  assert_eq!(none.state, EpochState::NoEpoch);
  assert!(none.epoch_id.is_none());

  let epoch = s.open_epoch(case_id, reviewer).await.unwrap();
  assert_eq!(epoch.state, EpochState::Pending);
  let pending = s.acceptance_state(case_id, reviewer).await.unwrap();
  assert_eq!(pending.epoch_id, Some(epoch.epoch_id));

  let accepted = s.record_accept(case_id, reviewer, epoch.epoch_id).await.unwrap();
  assert_eq!(accepted.state, EpochState::Accepted);
  assert!(accepted.decided_at.is_some());
  assert!(s.acceptance_state(case_id, reviewer).await.unwrap().is_accepted());

  // Decided epochs cannot be decided again.
  assert!(matches!(
    s.record_decline(case_id, reviewer, epoch.epoch_id, DeclineReason::Capacity, None).await,
    Err(crate::Error::EpochNotPending(_))
  ));
}

#[tokio::test]
async fn newest_epoch_decides_acceptance() {
  let s = store().await;
  let case_id = Uuid::new_v4();
  let reviewer = Uuid::new_v4();

  let first = s.open_epoch(case_id, reviewer).await.unwrap();
  s.record_accept(case_id, reviewer, first.epoch_id).await.unwrap();

  let second = s.open_epoch(case_id, reviewer).await.unwrap();
  let declined = s
    .record_decline(
      case_id,
      reviewer,
      second.epoch_id,
      DeclineReason::ConflictOfInterest,
      Some("represented the insurer".into()),
    )
    .await
    .unwrap();
  let decline = declined.decline.unwrap();
  assert_eq!(decline.reason, DeclineReason::ConflictOfInterest);
  assert_eq!(decline.text.as_deref(), Some("represented the insurer"));

  let state = s.acceptance_state(case_id, reviewer).await.unwrap();
  assert_eq!(state.state, EpochState::Declined);
  assert_eq!(state.epoch_id, Some(second.epoch_id));
}

#[tokio::test]
async fn accept_requires_matching_reviewer() {
  let s = store().await;
  let case_id = Uuid::new_v4();
  let epoch = s.open_epoch(case_id, Uuid::new_v4()).await.unwrap();

  assert!(s.record_accept(case_id, Uuid::new_v4(), epoch.epoch_id).await.is_err());
}

#[tokio::test]
async fn retired_record_refuses_conditional_writes() {
  let s = store().await;
  let mut ready = NewCase::intake(intake_content());
  ready.status = CaseStatus::Ready;
  let ready = s.insert(ready).await.unwrap();
  s.insert(NewCase::snapshot_of(&ready, ready.content.clone(), chrono::Utc::now(), Uuid::new_v4()))
    .await
    .unwrap();

  let outcome = s
    .update_content(ready.id, CaseStatus::EDITABLE, CaseContent::default())
    .await
    .unwrap();
  assert!(matches!(outcome, Conditional::Conflict { current: Some(CaseStatus::Ready) }));

  let outcome = s
    .update_status(ready.id, CaseStatus::EDITABLE, CaseStatus::Draft)
    .await
    .unwrap();
  assert!(matches!(outcome, Conditional::Conflict { current: Some(CaseStatus::Ready) }));

  let stored = s.get_by_id(ready.id).await.unwrap().unwrap();
  assert_eq!(stored.content, ready.content);
}

// ─── Release ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn release_produces_snapshot_and_continuation() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;

  let outcome = e.release(ready.id, &actor).await.unwrap();
  let snapshot = &outcome.snapshot;
  let draft = &outcome.continuation;

  assert_eq!(snapshot.status, CaseStatus::Released);
  assert_eq!(snapshot.parent_id, Some(ready.id));
  assert_eq!(snapshot.released_by, Some(actor.id));
  assert!(snapshot.released_at.is_some());
  assert_eq!(snapshot.content.release_counter(), 1);
  assert_eq!(snapshot.content.release.as_ref().unwrap().summary.items, 2);

  assert_eq!(draft.status, CaseStatus::Draft);
  assert_eq!(draft.parent_id, Some(snapshot.id));
  assert_eq!(draft.released_at, None);
  assert_eq!(draft.released_by, None);
  assert_eq!(draft.lineage_id, ready.lineage_id);
  assert_eq!(draft.content.assessments, ready.content.assessments);
  assert!(!outcome.corrected);

  let children: Vec<_> = e
    .store()
    .list_children(snapshot.id)
    .await
    .unwrap()
    .into_iter()
    .filter(|c| c.status == CaseStatus::Draft)
    .collect();
  assert_eq!(children.len(), 1);
  assert_eq!(children[0].id, draft.id);

  assert_eq!(e.active_case(actor.id).await.unwrap(), Some(draft.id));
  assert_eq!(lineage_len(&e, ready.id).await, 3);
}

#[tokio::test]
async fn releasing_twice_is_rejected_without_duplicates() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;
  let outcome = e.release(ready.id, &actor).await.unwrap();

  let err = e.release(ready.id, &actor).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::IllegalTransition);
  assert!(matches!(
    err,
    Error::AlreadyReleased { snapshot_id, continuation_id, .. }
      if snapshot_id == outcome.snapshot.id
        && continuation_id == Some(outcome.continuation.id)
  ));

  let err = e.release(outcome.snapshot.id, &actor).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::IllegalTransition);

  assert_eq!(lineage_len(&e, ready.id).await, 3);
}

#[tokio::test]
async fn draft_never_marked_ready_cannot_be_released() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let draft = e.open_case(&actor, intake_content()).await.unwrap();

  let err = e.release(draft.id, &actor).await.unwrap_err();
  assert!(matches!(
    err,
    Error::IllegalTransition { from: CaseStatus::Draft, .. }
  ));
  assert!(err.is_recoverable());
  assert_eq!(lineage_len(&e, draft.id).await, 1);
}

#[tokio::test]
async fn counters_increase_and_latest_release_wins() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let first = ready_case(&e, &actor).await;

  let mut snapshots = Vec::new();
  let mut current = first.clone();
  for _ in 0..3 {
    let outcome = e.release(current.id, &actor).await.unwrap();
    snapshots.push(outcome.snapshot.clone());
    current = e.mark_ready(outcome.continuation.id, &actor).await.unwrap();
  }

  let counters: Vec<u32> = snapshots.iter().map(|s| s.content.release_counter()).collect();
  assert_eq!(counters, vec![1, 2, 3]);

  let last = snapshots.last().unwrap();
  for any in [first.id, snapshots[0].id, snapshots[1].id, current.id] {
    let latest = e.latest_released(any).await.unwrap().unwrap();
    assert_eq!(latest.id, last.id);
  }

  let draft = e.current_draft(first.id).await.unwrap().unwrap();
  assert_eq!(draft.id, current.id);
}

#[tokio::test]
async fn snapshots_never_change() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;
  let outcome = e.release(ready.id, &actor).await.unwrap();
  let snapshot = outcome.snapshot.clone();

  // Work continues on the draft, then a second release and a close.
  let mut content = outcome.continuation.content.clone();
  content.jurisdiction = Some("NM".into());
  e.save_content(outcome.continuation.id, &actor, content).await.unwrap();
  e.mark_ready(outcome.continuation.id, &actor).await.unwrap();
  let second = e.release(outcome.continuation.id, &actor).await.unwrap();
  e.close_case(snapshot.id, &actor).await.unwrap();

  let err = e
    .save_content(snapshot.id, &actor, CaseContent::default())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::GuardrailViolation);

  let stored = e.store().get_by_id(snapshot.id).await.unwrap().unwrap();
  assert_eq!(stored.status, CaseStatus::Closed);
  assert_eq!(stored.content, snapshot.content);
  assert_eq!(stored.released_at, snapshot.released_at);
  assert_eq!(stored.released_by, snapshot.released_by);
  assert_eq!(stored.content.jurisdiction.as_deref(), Some("TX"));
  assert_eq!(second.snapshot.content.jurisdiction.as_deref(), Some("NM"));
}

#[tokio::test]
async fn released_record_is_retired() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;
  let outcome = e.release(ready.id, &actor).await.unwrap();

  let err = e
    .save_content(ready.id, &actor, intake_content())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Retired { case_id, snapshot_id } if case_id == ready.id && snapshot_id == outcome.snapshot.id
  ));

  let guardrails = e.guardrails(ready.id).await.unwrap();
  assert!(!guardrails.editable);
  assert!(!guardrails.releasable);
  assert_eq!(guardrails.retired_by, Some(outcome.snapshot.id));
}

#[tokio::test]
async fn release_schedules_follow_up() {
  let store = Arc::new(store().await);
  let policy = ReleasePolicy { follow_up_interval: Duration::days(14) };
  let e = CaseEngine::new(Arc::clone(&store), policy);
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;

  let outcome = e.release(ready.id, &actor).await.unwrap();
  let released_at = outcome.snapshot.released_at.unwrap();
  assert_eq!(outcome.follow_up_due, Some(released_at + Duration::days(14)));

  let follow_ups = store.follow_ups(ready.lineage_id).await.unwrap();
  assert_eq!(follow_ups.len(), 1);
  assert_eq!(follow_ups[0].snapshot_id, outcome.snapshot.id);
}

// ─── Create revision and close ───────────────────────────────────────────────

#[tokio::test]
async fn revision_from_older_snapshot() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;
  let first = e.release(ready.id, &actor).await.unwrap();
  e.mark_ready(first.continuation.id, &actor).await.unwrap();
  let second = e.release(first.continuation.id, &actor).await.unwrap();

  // The latest snapshot already has its live draft.
  let err = e
    .create_revision_from_snapshot(second.snapshot.id, &actor)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::ContinuationExists { continuation_id, .. } if continuation_id == second.continuation.id
  ));

  // The first snapshot's continuation was released, so it can be resumed.
  let revision = e
    .create_revision_from_snapshot(first.snapshot.id, &actor)
    .await
    .unwrap();
  assert_eq!(revision.draft.status, CaseStatus::Draft);
  assert_eq!(revision.draft.parent_id, Some(first.snapshot.id));
  assert_eq!(revision.draft.released_at, None);
  assert_eq!(revision.draft.content, first.snapshot.content);
  assert_eq!(e.active_case(actor.id).await.unwrap(), Some(revision.draft.id));

  // The lineage's current draft is still the one behind the latest release.
  let current = e.current_draft(ready.id).await.unwrap().unwrap();
  assert_eq!(current.id, second.continuation.id);
}

#[tokio::test]
async fn counter_after_revision_from_older_snapshot() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;
  let first = e.release(ready.id, &actor).await.unwrap();
  e.mark_ready(first.continuation.id, &actor).await.unwrap();
  let second = e.release(first.continuation.id, &actor).await.unwrap();

  let revision = e
    .create_revision_from_snapshot(first.snapshot.id, &actor)
    .await
    .unwrap();
  e.mark_ready(revision.draft.id, &actor).await.unwrap();
  let third = e.release(revision.draft.id, &actor).await.unwrap();

  let counters: Vec<u32> = [&first, &second, &third]
    .iter()
    .map(|o| o.snapshot.content.release_counter())
    .collect();
  assert_eq!(counters, vec![1, 2, 3]);

  let latest = e.latest_released(ready.id).await.unwrap().unwrap();
  assert_eq!(latest.id, third.snapshot.id);
}

#[tokio::test]
async fn revision_requires_a_released_record() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let draft = e.open_case(&actor, intake_content()).await.unwrap();

  let err = e.create_revision_from_snapshot(draft.id, &actor).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::IllegalTransition);
}

#[tokio::test]
async fn closed_is_terminal() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;
  let outcome = e.release(ready.id, &actor).await.unwrap();

  let err = e.close_case(ready.id, &actor).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::IllegalTransition);

  let closed = e.close_case(outcome.snapshot.id, &actor).await.unwrap();
  assert_eq!(closed.status, CaseStatus::Closed);
  assert_eq!(closed.released_at, outcome.snapshot.released_at);

  for result in [
    e.close_case(closed.id, &actor).await,
    e.mark_ready(closed.id, &actor).await,
    e.create_revision_from_snapshot(closed.id, &actor).await.map(|c| c.draft),
  ] {
    assert!(result.is_err());
  }
}

// ─── Acceptance gate ─────────────────────────────────────────────────────────

#[tokio::test]
async fn reviewer_without_epoch_cannot_save() {
  let e = engine().await;
  let manager = Actor::case_manager(Uuid::new_v4());
  let reviewer = Actor::reviewer(Uuid::new_v4());
  let case = e.open_case(&manager, intake_content()).await.unwrap();

  let err = e
    .save_content(case.id, &reviewer, intake_content())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::AcceptanceRequired { state: EpochState::NoEpoch, .. }
  ));

  let stored = e.store().get_by_id(case.id).await.unwrap().unwrap();
  assert_eq!(stored.updated_at, case.updated_at);
}

#[tokio::test]
async fn acceptance_carries_across_the_lineage() {
  let e = engine().await;
  let manager = Actor::case_manager(Uuid::new_v4());
  let reviewer = Actor::reviewer(Uuid::new_v4());
  let case = ready_case(&e, &manager).await;

  let epoch = e.assign_reviewer(case.id, reviewer.id).await.unwrap();
  assert!(e.release(case.id, &reviewer).await.is_err());

  e.accept_assignment(case.id, reviewer.id, epoch.epoch_id).await.unwrap();
  let outcome = e.release(case.id, &reviewer).await.unwrap();
  assert_eq!(outcome.snapshot.released_by, Some(reviewer.id));

  // Same lineage, new record: the gate still passes.
  let state = e.acceptance_state(outcome.continuation.id, reviewer.id).await.unwrap();
  assert!(state.is_accepted());
  e.save_assessments(
    outcome.continuation.id,
    &reviewer,
    outcome.continuation.content.assessments.clone(),
  )
  .await
  .unwrap();
}

#[tokio::test]
async fn declined_reviewer_is_blocked() {
  let e = engine().await;
  let manager = Actor::case_manager(Uuid::new_v4());
  let reviewer = Actor::reviewer(Uuid::new_v4());
  let case = e.open_case(&manager, intake_content()).await.unwrap();

  let epoch = e.assign_reviewer(case.id, reviewer.id).await.unwrap();
  e.decline_assignment(case.id, reviewer.id, epoch.epoch_id, DeclineReason::OutsideExpertise, None)
    .await
    .unwrap();

  let err = e.mark_ready(case.id, &reviewer).await.unwrap_err();
  assert!(matches!(
    err,
    Error::AcceptanceRequired { state: EpochState::Declined, .. }
  ));

  // A decided epoch cannot be reopened by accepting it.
  let err = e
    .accept_assignment(case.id, reviewer.id, epoch.epoch_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::EpochNotPending { state: EpochState::Declined, .. }));
  assert_eq!(err.kind(), ErrorKind::IllegalTransition);
}

// ─── Assessments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn lowered_score_needs_rationale_to_save() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let case = e.open_case(&actor, intake_content()).await.unwrap();

  let mut document = case.content.assessments.clone();
  let pain = document.get_mut("pain").unwrap();
  ceiling::set_reviewer_score(pain, score(2)).unwrap();

  let err = e
    .save_assessments(case.id, &actor, document.clone())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::RationaleRequired);
  let stored = e.store().get_by_id(case.id).await.unwrap().unwrap();
  assert_eq!(stored.content.assessments, case.content.assessments);

  ceiling::set_rationale(document.get_mut("pain").unwrap(), "Imaging shows full recovery");
  let saved = e.save_assessments(case.id, &actor, document).await.unwrap();
  let pain = saved.content.assessments.get("pain").unwrap();
  assert_eq!(pain.reviewer_score, Some(score(2)));
}

#[tokio::test]
async fn raised_score_never_reaches_the_store() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let case = e.open_case(&actor, intake_content()).await.unwrap();

  let mut document = case.content.assessments.clone();
  document.get_mut("sleep").unwrap().reviewer_score = Some(score(5));

  let err = e.save_assessments(case.id, &actor, document).await.unwrap_err();
  assert!(matches!(err, Error::CeilingViolation { ref item, .. } if item == "sleep"));

  let stored = e.store().get_by_id(case.id).await.unwrap().unwrap();
  assert_eq!(stored.content.assessments.get("sleep").unwrap().reviewer_score, None);
}

#[tokio::test]
async fn subject_scores_cannot_be_rewritten_on_save() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let case = e.open_case(&actor, intake_content()).await.unwrap();

  // Raising the baseline to make room for a higher reviewer score.
  let mut raised = case.content.assessments.clone();
  let sleep = raised.get_mut("sleep").unwrap();
  sleep.subject_score = Some(score(5));
  sleep.reviewer_score = Some(score(5));
  let err = e.save_assessments(case.id, &actor, raised).await.unwrap_err();
  assert!(matches!(err, Error::BaselineChanged { ref item } if item == "sleep"));
  assert_eq!(err.kind(), ErrorKind::CeilingViolation);

  // Erasing the baseline through a full content save.
  let mut content = case.content.clone();
  let pain = content.assessments.get_mut("pain").unwrap();
  pain.subject_score = None;
  pain.reviewer_score = Some(score(5));
  let err = e.save_content(case.id, &actor, content).await.unwrap_err();
  assert!(matches!(err, Error::BaselineChanged { ref item } if item == "pain"));

  // Dropping a baselined item.
  let mut dropped = case.content.assessments.clone();
  dropped.items.retain(|item| item.key != "pain");
  let err = e.save_assessments(case.id, &actor, dropped).await.unwrap_err();
  assert!(matches!(err, Error::BaselineChanged { ref item } if item == "pain"));

  let stored = e.store().get_by_id(case.id).await.unwrap().unwrap();
  assert_eq!(stored.content.assessments, case.content.assessments);
}

#[tokio::test]
async fn legacy_score_survives_resave() {
  let s = store().await;
  let mut content = intake_content();
  content.assessments.get_mut("pain").unwrap().reviewer_score = Some(score(5));
  // Legacy rows bypass the engine.
  let legacy = s.insert(NewCase::intake(content)).await.unwrap();

  let e = CaseEngine::new(Arc::new(s), ReleasePolicy::default());
  let actor = Actor::case_manager(Uuid::new_v4());
  let saved = e
    .save_assessments(legacy.id, &actor, legacy.content.assessments.clone())
    .await
    .unwrap();
  assert!(ceiling::is_legacy_above_ceiling(saved.content.assessments.get("pain").unwrap()));
}

// ─── Lineage view ────────────────────────────────────────────────────────────

#[tokio::test]
async fn lineage_view_links_latest_and_current() {
  let e = engine().await;
  let actor = Actor::case_manager(Uuid::new_v4());
  let ready = ready_case(&e, &actor).await;

  let before = e.lineage_view(ready.id).await.unwrap();
  assert!(before.latest_released.is_none());
  assert_eq!(before.current_draft.as_ref().map(|r| r.id), Some(ready.id));
  assert_eq!(before.releases, 0);

  let outcome = e.release(ready.id, &actor).await.unwrap();
  let after = e.lineage_view(outcome.continuation.id).await.unwrap();
  assert_eq!(after.latest_released.as_ref().map(|r| r.id), Some(outcome.snapshot.id));
  assert_eq!(after.current_draft.as_ref().map(|r| r.id), Some(outcome.continuation.id));
  assert!(!after.awaiting_continuation);
  assert!(after.warnings.is_empty());
  assert_eq!(after.releases, 1);
}
