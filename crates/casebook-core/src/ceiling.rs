//! Score ceiling validation.
//!
//! A reviewer may lower a subject-reported severity score but never raise it,
//! and every downward adjustment needs a written rationale. Items without a
//! subject baseline are unconstrained but must be scored by the reviewer.
//!
//! The edit functions (`set_reviewer_score`, `reset`, `clear`) enforce the
//! ceiling at the moment a value is picked and leave the item untouched when
//! they fail. [`validate_document`] is the save-time check over a whole
//! document.
//!
//! A reviewer score above the subject's can only come from legacy data. Such
//! a value is frozen: it is not an error, but it may only move down.

use crate::{
  Error, ItemIssue, Result,
  assessment::{Adjustment, AssessmentDocument, AssessmentItem, Score},
};

/// The highest score the reviewer may pick, if constrained.
pub fn ceiling(item: &AssessmentItem) -> Option<Score> { item.subject_score }

/// `true` if the item holds a reviewer score above its ceiling.
pub fn is_legacy_above_ceiling(item: &AssessmentItem) -> bool {
  matches!(
    (item.reviewer_score, ceiling(item)),
    (Some(reviewer), Some(ceiling)) if reviewer > ceiling
  )
}

/// Scores offered to the reviewer, lowest first. A frozen legacy value stays
/// selectable so the current state can be displayed.
pub fn selectable_scores(item: &AssessmentItem) -> Vec<Score> {
  let upper = match (ceiling(item), item.reviewer_score) {
    (None, _) => return Score::scale().collect(),
    (Some(ceiling), Some(current)) if current > ceiling => current,
    (Some(ceiling), _) => ceiling,
  };
  Score::scale().take_while(|score| *score <= upper).collect()
}

pub fn classify(item: &AssessmentItem) -> Adjustment {
  match (item.subject_score, item.reviewer_score) {
    (None, None) => Adjustment::Unscored,
    (None, Some(_)) => Adjustment::ReviewerOnly,
    (Some(_), None) => Adjustment::MatchesSubject,
    (Some(subject), Some(reviewer)) if reviewer < subject => Adjustment::Lowered,
    (Some(subject), Some(reviewer)) if reviewer > subject => {
      Adjustment::LegacyAboveCeiling
    }
    (Some(_), Some(_)) => Adjustment::MatchesSubject,
  }
}

/// Whether `text` counts as a rationale: non-empty after trimming.
pub fn has_rationale(text: Option<&str>) -> bool {
  text.is_some_and(|t| !t.trim().is_empty())
}

// ─── Edits ───────────────────────────────────────────────────────────────────

/// Pick a reviewer score. Rejects anything above the ceiling, except the
/// frozen legacy value itself or a value below it.
pub fn set_reviewer_score(item: &mut AssessmentItem, score: Score) -> Result<()> {
  if let Some(limit) = ceiling(item)
    && score > limit
    && !within_frozen_legacy(item.reviewer_score, limit, score)
  {
    return Err(Error::CeilingViolation {
      item:      item.key.clone(),
      attempted: score,
      ceiling:   limit,
    });
  }
  item.reviewer_score = Some(score);
  Ok(())
}

pub fn set_rationale(item: &mut AssessmentItem, text: impl Into<String>) {
  let text = text.into();
  item.rationale = (!text.trim().is_empty()).then_some(text);
}

/// Restore the reviewer score to the subject's and drop the rationale.
pub fn reset(item: &mut AssessmentItem) {
  item.reviewer_score = item.subject_score;
  item.rationale = None;
}

/// Empty the reviewer score. Only legal without a subject baseline.
pub fn clear(item: &mut AssessmentItem) -> Result<()> {
  if item.subject_score.is_some() {
    return Err(Error::ClearWithBaseline { item: item.key.clone() });
  }
  item.reviewer_score = None;
  Ok(())
}

fn within_frozen_legacy(current: Option<Score>, limit: Score, wanted: Score) -> bool {
  current.is_some_and(|current| current > limit && wanted <= current)
}

// ─── Save-time validation ────────────────────────────────────────────────────

/// Everything about `item` that blocks saving. `persisted` is the same item
/// as currently stored: its subject score is the ceiling, and its reviewer
/// score is how a frozen legacy value is recognised.
pub fn item_issues(
  item: &AssessmentItem,
  persisted: Option<&AssessmentItem>,
) -> Vec<ItemIssue> {
  let mut issues = Vec::new();
  let subject = persisted.map_or(item.subject_score, |p| p.subject_score);

  match (subject, item.reviewer_score) {
    (None, None) => issues.push(ItemIssue::MissingReviewerScore { item: item.key.clone() }),
    (Some(subject), Some(reviewer)) if reviewer > subject => {
      let frozen = persisted.and_then(|p| p.reviewer_score);
      if !within_frozen_legacy(frozen, subject, reviewer) {
        issues.push(ItemIssue::AboveCeiling {
          item:    item.key.clone(),
          score:   reviewer,
          ceiling: subject,
        });
      }
    }
    (Some(subject), Some(reviewer)) if reviewer < subject => {
      if !has_rationale(item.rationale.as_deref()) {
        issues.push(ItemIssue::MissingRationale { item: item.key.clone() });
      }
    }
    _ => {}
  }

  issues
}

/// Subject scores are fixed once stored. Every persisted item must come back
/// with the same subject score, and an item carrying one may not be dropped.
pub fn check_baselines(
  document: &AssessmentDocument,
  persisted: &AssessmentDocument,
) -> Result<()> {
  for stored in &persisted.items {
    let unchanged = match document.get(&stored.key) {
      Some(item) => item.subject_score == stored.subject_score,
      None => stored.subject_score.is_none(),
    };
    if !unchanged {
      return Err(Error::BaselineChanged { item: stored.key.clone() });
    }
  }
  Ok(())
}

/// Validate a whole document before it is persisted. A changed baseline is
/// reported as [`Error::BaselineChanged`] and any ceiling breach as
/// [`Error::CeilingViolation`]; otherwise every missing rationale or score is
/// collected into one [`Error::RationaleRequired`].
pub fn validate_document(
  document: &AssessmentDocument,
  persisted: Option<&AssessmentDocument>,
) -> Result<()> {
  if let Some(persisted) = persisted {
    check_baselines(document, persisted)?;
  }

  let issues: Vec<ItemIssue> = document
    .items
    .iter()
    .flat_map(|item| item_issues(item, persisted.and_then(|p| p.get(&item.key))))
    .collect();

  if let Some(ItemIssue::AboveCeiling { item, score, ceiling }) = issues
    .iter()
    .find(|issue| matches!(issue, ItemIssue::AboveCeiling { .. }))
  {
    return Err(Error::CeilingViolation {
      item:      item.clone(),
      attempted: *score,
      ceiling:   *ceiling,
    });
  }

  if issues.is_empty() {
    Ok(())
  } else {
    Err(Error::RationaleRequired(issues))
  }
}
