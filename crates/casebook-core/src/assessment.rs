//! Assessment items: scored severity questions embedded in a case.
//!
//! Each item may carry a score reported by the subject of the case and a score
//! set by the reviewer. The rules tying the two together live in
//! [`crate::ceiling`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, ceiling};

// ─── Score ───────────────────────────────────────────────────────────────────

/// A severity value on the fixed ordinal scale [`Score::MIN`]..=[`Score::MAX`].
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 5;

  pub fn new(value: u8) -> Option<Self> {
    (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
  }

  pub fn get(self) -> u8 { self.0 }

  /// Every score on the scale, lowest first.
  pub fn scale() -> impl Iterator<Item = Self> { (Self::MIN..=Self::MAX).map(Self) }
}

impl TryFrom<u8> for Score {
  type Error = Error;

  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Self::new(value).ok_or(Error::ScoreOutOfRange(value))
  }
}

impl From<Score> for u8 {
  fn from(score: Score) -> Self { score.0 }
}

impl fmt::Display for Score {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

// ─── Items ───────────────────────────────────────────────────────────────────

/// One scored question or domain inside a case assessment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentItem {
  /// Stable key, unique within its document.
  pub key:            String,
  pub label:          String,
  #[serde(default)]
  pub subject_score:  Option<Score>,
  #[serde(default)]
  pub reviewer_score: Option<Score>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rationale:      Option<String>,
}

impl AssessmentItem {
  pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
    Self { key: key.into(), label: label.into(), ..Self::default() }
  }

  pub fn with_subject_score(mut self, score: Score) -> Self {
    self.subject_score = Some(score);
    self
  }

  /// The score that counts for this item: the reviewer's if set, otherwise
  /// the subject's baseline.
  pub fn effective_score(&self) -> Option<Score> {
    self.reviewer_score.or(self.subject_score)
  }
}

/// How a reviewer's score relates to the subject's, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
  /// Neither party has scored the item.
  Unscored,
  /// The reviewer agrees with the subject (explicitly or by default).
  MatchesSubject,
  /// The reviewer scored below the subject.
  Lowered,
  /// No subject baseline; the reviewer's score stands alone.
  ReviewerOnly,
  /// A persisted reviewer score above the subject's, frozen as legacy data.
  LegacyAboveCeiling,
}

// ─── Document ────────────────────────────────────────────────────────────────

/// The full set of assessment items on a case. Saved as a unit: one blocking
/// item blocks the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssessmentDocument {
  pub items: Vec<AssessmentItem>,
}

impl AssessmentDocument {
  pub fn new(items: Vec<AssessmentItem>) -> Self { Self { items } }

  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  pub fn get(&self, key: &str) -> Option<&AssessmentItem> {
    self.items.iter().find(|item| item.key == key)
  }

  pub fn get_mut(&mut self, key: &str) -> Option<&mut AssessmentItem> {
    self.items.iter_mut().find(|item| item.key == key)
  }

  /// Derived figures stamped onto a snapshot at release.
  pub fn summary(&self) -> AssessmentSummary {
    let mut summary = AssessmentSummary { items: self.items.len(), ..Default::default() };
    let mut total = 0u32;

    for item in &self.items {
      if let Some(score) = item.effective_score() {
        summary.scored += 1;
        total += u32::from(score.get());
      }
      match ceiling::classify(item) {
        Adjustment::Lowered => summary.lowered += 1,
        Adjustment::LegacyAboveCeiling => summary.legacy += 1,
        _ => {}
      }
    }

    if summary.scored > 0 {
      summary.mean_score = Some(f64::from(total) / summary.scored as f64);
    }
    summary
  }
}

/// Aggregate figures over an [`AssessmentDocument`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSummary {
  pub items:      usize,
  /// Items with an effective score.
  pub scored:     usize,
  pub lowered:    usize,
  pub legacy:     usize,
  /// Mean effective score across scored items.
  pub mean_score: Option<f64>,
}
