//! [`CaseEngine`]: lifecycle operations over any [`AssignmentStore`].
//!
//! Every mutating operation runs its guardrails against freshly read state
//! before it writes, and writes through conditional updates so a concurrent
//! change surfaces as an error instead of being overwritten. Release and
//! create-revision live in [`crate::release`]; read paths in [`crate::chain`].

use std::sync::Arc;

use chrono::Duration;
use tracing::info;
use uuid::Uuid;

use crate::{
  Error, Result,
  assessment::AssessmentDocument,
  assignment::{AcceptanceState, AssignmentEpoch, DeclineReason, EpochState},
  case::{Actor, CaseContent, CaseRecord, CaseStatus, NewCase},
  ceiling,
  guardrail::{self, Guardrails},
  lifecycle::{self, Transition},
  store::{AssignmentStore, CaseStore, Conditional},
};

/// Tunables for the release transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleasePolicy {
  /// Delay between a release and the follow-up review it schedules.
  pub follow_up_interval: Duration,
}

impl Default for ReleasePolicy {
  fn default() -> Self { Self { follow_up_interval: Duration::days(30) } }
}

/// The lifecycle engine. Cloning is cheap; the store is shared.
pub struct CaseEngine<S> {
  pub(crate) store:  Arc<S>,
  pub(crate) policy: ReleasePolicy,
}

impl<S> Clone for CaseEngine<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store), policy: self.policy } }
}

impl<S: AssignmentStore> CaseEngine<S> {
  pub fn new(store: Arc<S>, policy: ReleasePolicy) -> Self { Self { store, policy } }

  pub fn store(&self) -> &S { &self.store }

  pub fn policy(&self) -> ReleasePolicy { self.policy }

  pub(crate) async fn load(&self, id: Uuid) -> Result<CaseRecord> {
    self
      .store
      .get_by_id(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::CaseNotFound(id))
  }

  /// Run the acceptance gate for `actor` on `record`'s lineage.
  pub(crate) async fn require_acceptance(
    &self,
    record: &CaseRecord,
    actor: &Actor,
  ) -> Result<()> {
    if !guardrail::requires_acceptance(actor) {
      return Ok(());
    }
    let acceptance = self
      .store
      .acceptance_state(record.lineage_id, actor.id)
      .await
      .map_err(Error::store)?;
    guardrail::check_acceptance(record.lineage_id, actor, &acceptance)
  }

  /// Fail with [`Error::Retired`] if `record` already has a snapshot child.
  pub(crate) async fn ensure_live(&self, record: &CaseRecord) -> Result<()> {
    if let Some(snapshot) = self.snapshot_child(record.id).await? {
      return Err(Error::Retired { case_id: record.id, snapshot_id: snapshot.id });
    }
    Ok(())
  }

  pub(crate) async fn snapshot_child(&self, id: Uuid) -> Result<Option<CaseRecord>> {
    let children = self.store.list_children(id).await.map_err(Error::store)?;
    Ok(children.into_iter().find(|c| guardrail::is_immutable(c.status)))
  }

  /// Point read of a single record.
  pub async fn get_case(&self, id: Uuid) -> Result<CaseRecord> { self.load(id).await }

  // ── Intake and editing ────────────────────────────────────────────────

  /// Create the root draft of a new lineage.
  pub async fn open_case(&self, actor: &Actor, content: CaseContent) -> Result<CaseRecord> {
    let mut content = content;
    content.release = None;
    // Intake may arrive before anyone has scored; only ceiling breaches are
    // refused at this point.
    match ceiling::validate_document(&content.assessments, None) {
      Ok(()) | Err(Error::RationaleRequired(_)) => {}
      Err(err) => return Err(err),
    }

    let record = self
      .store
      .insert(NewCase::intake(content))
      .await
      .map_err(Error::store)?;
    self
      .store
      .set_active_case(actor.id, record.id)
      .await
      .map_err(Error::store)?;
    info!(case_id = %record.id, actor = %actor.id, "opened case");
    Ok(record)
  }

  /// Replace the content of an editable record. The release stamp cannot be
  /// changed this way and the assessment document must pass the ceiling
  /// validator.
  pub async fn save_content(
    &self,
    id: Uuid,
    actor: &Actor,
    content: CaseContent,
  ) -> Result<CaseRecord> {
    let record = self.load(id).await?;
    self.require_acceptance(&record, actor).await?;
    guardrail::ensure_editable(&record)?;
    self.ensure_live(&record).await?;

    ceiling::validate_document(&content.assessments, Some(&record.content.assessments))?;

    let mut content = content;
    content.release = record.content.release.clone();
    self.write_content(&record, content).await
  }

  /// Save the assessment document of an editable record as a unit.
  pub async fn save_assessments(
    &self,
    id: Uuid,
    actor: &Actor,
    document: AssessmentDocument,
  ) -> Result<CaseRecord> {
    let record = self.load(id).await?;
    self.require_acceptance(&record, actor).await?;
    guardrail::ensure_editable(&record)?;
    self.ensure_live(&record).await?;

    ceiling::validate_document(&document, Some(&record.content.assessments))?;

    let mut content = record.content.clone();
    content.assessments = document;
    self.write_content(&record, content).await
  }

  async fn write_content(&self, record: &CaseRecord, content: CaseContent) -> Result<CaseRecord> {
    match self
      .store
      .update_content(record.id, CaseStatus::EDITABLE, content)
      .await
      .map_err(Error::store)?
    {
      Conditional::Applied(updated) => Ok(updated),
      Conditional::Conflict { current } => {
        Err(self.edit_conflict(record.id, current, Transition::Edit).await)
      }
    }
  }

  /// Explain a refused write to an editable record. A record that is still
  /// editable but lost the write was released in the meantime.
  async fn edit_conflict(
    &self,
    case_id: Uuid,
    current: Option<CaseStatus>,
    transition: Transition,
  ) -> Error {
    if current.is_some_and(guardrail::is_editable) {
      match self.snapshot_child(case_id).await {
        Ok(Some(snapshot)) => return Error::Retired { case_id, snapshot_id: snapshot.id },
        Ok(None) => {}
        Err(err) => return err,
      }
    }
    conflict(case_id, current, transition)
  }

  /// `draft → ready`.
  pub async fn mark_ready(&self, id: Uuid, actor: &Actor) -> Result<CaseRecord> {
    let record = self.load(id).await?;
    self.require_acceptance(&record, actor).await?;
    let to = lifecycle::next_status(record.id, record.status, Transition::MarkReady)?;
    self.ensure_live(&record).await?;

    match self
      .store
      .update_status(record.id, CaseStatus::EDITABLE, to)
      .await
      .map_err(Error::store)?
    {
      Conditional::Applied(updated) => {
        info!(case_id = %updated.id, actor = %actor.id, "marked case ready");
        Ok(updated)
      }
      Conditional::Conflict { current } => {
        Err(self.edit_conflict(record.id, current, Transition::MarkReady).await)
      }
    }
  }

  /// `released → closed`. Terminal.
  pub async fn close_case(&self, id: Uuid, actor: &Actor) -> Result<CaseRecord> {
    let record = self.load(id).await?;
    self.require_acceptance(&record, actor).await?;
    lifecycle::next_status(record.id, record.status, Transition::Close)?;

    match self.store.close(record.id).await.map_err(Error::store)? {
      Conditional::Applied(closed) => {
        info!(case_id = %closed.id, actor = %actor.id, "closed case");
        Ok(closed)
      }
      Conditional::Conflict { current } => Err(conflict(record.id, current, Transition::Close)),
    }
  }

  /// What may currently be done with `id`.
  pub async fn guardrails(&self, id: Uuid) -> Result<Guardrails> {
    let record = self.load(id).await?;
    let retired_by = if guardrail::is_editable(record.status) {
      self.snapshot_child(record.id).await?.map(|s| s.id)
    } else {
      None
    };
    Ok(Guardrails::for_record(&record, retired_by))
  }

  pub async fn active_case(&self, user_id: Uuid) -> Result<Option<Uuid>> {
    self.store.active_case(user_id).await.map_err(Error::store)
  }

  // ── Assignment ────────────────────────────────────────────────────────

  /// Record a pending assignment of `reviewer_id` to the lineage of `id`.
  pub async fn assign_reviewer(&self, id: Uuid, reviewer_id: Uuid) -> Result<AssignmentEpoch> {
    let record = self.load(id).await?;
    let epoch = self
      .store
      .open_epoch(record.lineage_id, reviewer_id)
      .await
      .map_err(Error::store)?;
    info!(lineage_id = %record.lineage_id, %reviewer_id, epoch_id = %epoch.epoch_id, "opened assignment epoch");
    Ok(epoch)
  }

  pub async fn acceptance_state(&self, id: Uuid, reviewer_id: Uuid) -> Result<AcceptanceState> {
    let record = self.load(id).await?;
    self
      .store
      .acceptance_state(record.lineage_id, reviewer_id)
      .await
      .map_err(Error::store)
  }

  /// Fail unless `epoch_id` is the reviewer's latest epoch and still
  /// pending.
  async fn ensure_pending(
    &self,
    lineage_id: Uuid,
    reviewer_id: Uuid,
    epoch_id: Uuid,
  ) -> Result<()> {
    let current = self
      .store
      .acceptance_state(lineage_id, reviewer_id)
      .await
      .map_err(Error::store)?;
    if current.epoch_id != Some(epoch_id) || current.state != EpochState::Pending {
      return Err(Error::EpochNotPending { epoch_id, state: current.state });
    }
    Ok(())
  }

  pub async fn accept_assignment(
    &self,
    id: Uuid,
    reviewer_id: Uuid,
    epoch_id: Uuid,
  ) -> Result<AssignmentEpoch> {
    let record = self.load(id).await?;
    self.ensure_pending(record.lineage_id, reviewer_id, epoch_id).await?;
    let epoch = self
      .store
      .record_accept(record.lineage_id, reviewer_id, epoch_id)
      .await
      .map_err(Error::store)?;
    info!(lineage_id = %record.lineage_id, %reviewer_id, %epoch_id, "assignment accepted");
    Ok(epoch)
  }

  pub async fn decline_assignment(
    &self,
    id: Uuid,
    reviewer_id: Uuid,
    epoch_id: Uuid,
    reason: DeclineReason,
    text: Option<String>,
  ) -> Result<AssignmentEpoch> {
    let record = self.load(id).await?;
    self.ensure_pending(record.lineage_id, reviewer_id, epoch_id).await?;
    let epoch = self
      .store
      .record_decline(record.lineage_id, reviewer_id, epoch_id, reason, text)
      .await
      .map_err(Error::store)?;
    info!(
      lineage_id = %record.lineage_id,
      %reviewer_id,
      %epoch_id,
      reason = reason.as_str(),
      "assignment declined"
    );
    Ok(epoch)
  }
}

/// Map a failed conditional update to the error the caller would have seen
/// had it read the newer state first.
pub(crate) fn conflict(
  case_id: Uuid,
  current: Option<CaseStatus>,
  transition: Transition,
) -> Error {
  match current {
    None => Error::CaseNotFound(case_id),
    Some(status) if guardrail::is_immutable(status) => Error::Immutable { case_id, status },
    Some(from) => Error::IllegalTransition { case_id, from, transition },
  }
}

impl<S: CaseStore> std::fmt::Debug for CaseEngine<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CaseEngine").field("policy", &self.policy).finish_non_exhaustive()
  }
}
