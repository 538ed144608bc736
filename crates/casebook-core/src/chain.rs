//! Revision chain resolution.
//!
//! Records only point backwards (`parent_id`). The resolver never walks that
//! chain one hop per query: every record carries its lineage id, so a whole
//! lineage is fetched with one indexed read and resolved in memory.

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  CaseEngine, IntegrityIssue, Result,
  case::{CaseRecord, CaseStatus},
  guardrail,
  store::AssignmentStore,
};

/// Every record of one lineage.
#[derive(Debug, Clone)]
pub struct Lineage {
  lineage_id: Uuid,
  records:    Vec<CaseRecord>,
}

impl Lineage {
  pub fn new(lineage_id: Uuid, records: Vec<CaseRecord>) -> Self {
    Self { lineage_id, records }
  }

  pub fn lineage_id(&self) -> Uuid { self.lineage_id }

  pub fn records(&self) -> &[CaseRecord] { &self.records }

  pub fn get(&self, id: Uuid) -> Option<&CaseRecord> {
    self.records.iter().find(|r| r.id == id)
  }

  pub fn root(&self) -> Option<&CaseRecord> {
    self.records.iter().find(|r| r.id == self.lineage_id && r.is_root())
  }

  pub fn children_of(&self, id: Uuid) -> impl Iterator<Item = &CaseRecord> {
    self.records.iter().filter(move |r| r.parent_id == Some(id))
  }

  /// The snapshot released from `id`, if any. A record with a snapshot child
  /// is retired: it stays editable by status but is no longer live.
  pub fn snapshot_of(&self, id: Uuid) -> Option<&CaseRecord> {
    self.children_of(id).find(|r| guardrail::is_immutable(r.status))
  }

  pub fn is_retired(&self, id: Uuid) -> bool { self.snapshot_of(id).is_some() }

  /// Editable, non-retired children of `id`.
  pub fn live_children_of(&self, id: Uuid) -> Vec<&CaseRecord> {
    self
      .children_of(id)
      .filter(|r| guardrail::is_editable(r.status) && !self.is_retired(r.id))
      .collect()
  }

  /// The released record with the greatest `released_at`. Closed snapshots
  /// are not candidates.
  pub fn latest_released(&self) -> Option<&CaseRecord> {
    latest_by_release(self.records.iter().filter(|r| r.status == CaseStatus::Released))
  }

  /// The latest snapshot of either immutable status. Live drafts hang off
  /// this record.
  pub fn latest_snapshot(&self) -> Option<&CaseRecord> {
    latest_by_release(self.records.iter().filter(|r| guardrail::is_immutable(r.status)))
  }

  /// Records that could be the lineage's current draft. More than one is an
  /// integrity violation.
  pub fn draft_candidates(&self) -> Vec<&CaseRecord> {
    match self.latest_snapshot() {
      Some(anchor) => self.live_children_of(anchor.id),
      None => self
        .root()
        .filter(|root| guardrail::is_editable(root.status))
        .into_iter()
        .collect(),
    }
  }

  /// The single live draft, `None` if there is none yet, or
  /// [`IntegrityIssue::MultipleDrafts`].
  pub fn current_draft(&self) -> Result<Option<&CaseRecord>, IntegrityIssue> {
    match self.draft_candidates().as_slice() {
      [] => Ok(None),
      [draft] => Ok(Some(*draft)),
      many => Err(IntegrityIssue::MultipleDrafts {
        lineage_id: self.lineage_id,
        candidates: many.iter().map(|r| r.id).collect(),
      }),
    }
  }

  /// A snapshot exists but nothing continues from it. Either a release is
  /// between inserting its snapshot and its continuation, or the
  /// continuation insert failed.
  pub fn awaiting_continuation(&self) -> bool {
    self.latest_snapshot().is_some() && self.draft_candidates().is_empty()
  }

  pub fn view(&self) -> LineageView {
    let (current_draft, warnings) = match self.current_draft() {
      Ok(draft) => (draft.cloned(), Vec::new()),
      Err(issue) => (None, vec![issue]),
    };
    LineageView {
      lineage_id: self.lineage_id,
      latest_released: self.latest_released().cloned(),
      current_draft,
      awaiting_continuation: self.awaiting_continuation(),
      releases: self
        .records
        .iter()
        .filter(|r| guardrail::is_immutable(r.status))
        .count(),
      warnings,
    }
  }
}

fn latest_by_release<'a>(
  records: impl Iterator<Item = &'a CaseRecord>,
) -> Option<&'a CaseRecord> {
  records.max_by_key(|r| (r.released_at, r.content.release_counter(), r.created_at))
}

/// Read model for "latest released" and "current draft" links.
#[derive(Debug, Clone, Serialize)]
pub struct LineageView {
  pub lineage_id:            Uuid,
  pub latest_released:       Option<CaseRecord>,
  pub current_draft:         Option<CaseRecord>,
  pub awaiting_continuation: bool,
  /// Number of snapshots, released or closed.
  pub releases:              usize,
  /// Integrity problems found while resolving; never repaired here.
  pub warnings:              Vec<IntegrityIssue>,
}

// ─── Engine queries ──────────────────────────────────────────────────────────

impl<S: AssignmentStore> CaseEngine<S> {
  /// Fetch the lineage containing `any_id`.
  pub async fn lineage(&self, any_id: Uuid) -> Result<Lineage> {
    let record = self.load(any_id).await?;
    self.lineage_of(&record).await
  }

  pub(crate) async fn lineage_of(&self, record: &CaseRecord) -> Result<Lineage> {
    let records = self
      .store
      .list_by_lineage(record.lineage_id)
      .await
      .map_err(crate::Error::store)?;
    debug!(lineage_id = %record.lineage_id, records = records.len(), "resolved lineage");
    Ok(Lineage::new(record.lineage_id, records))
  }

  /// The latest released snapshot of the lineage containing `any_id`.
  pub async fn latest_released(&self, any_id: Uuid) -> Result<Option<CaseRecord>> {
    Ok(self.lineage(any_id).await?.latest_released().cloned())
  }

  /// The live editable record of the lineage containing `any_id`. Fails with
  /// [`crate::Error::IntegrityViolation`] if there is more than one.
  pub async fn current_draft(&self, any_id: Uuid) -> Result<Option<CaseRecord>> {
    let lineage = self.lineage(any_id).await?;
    match lineage.current_draft() {
      Ok(draft) => Ok(draft.cloned()),
      Err(issue) => {
        warn!(%issue, "lineage integrity violation");
        Err(issue.into())
      }
    }
  }

  /// Both links plus any integrity warnings, without failing on them.
  pub async fn lineage_view(&self, any_id: Uuid) -> Result<LineageView> {
    let view = self.lineage(any_id).await?.view();
    for issue in &view.warnings {
      warn!(%issue, "lineage integrity violation");
    }
    Ok(view)
  }
}
