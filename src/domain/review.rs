use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::INITIAL_EASE_FACTOR;

/// Spaced-repetition state for one practice item.
///
/// Invariant: `next_review_at == last_review_at + interval days`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
  pub item_id: String,
  pub interval: i64,
  pub ease_factor: f64,
  pub repetitions: i64,
  pub next_review_at: DateTime<Utc>,
  pub last_review_at: DateTime<Utc>,
  pub correct_count: i64,
  pub incorrect_count: i64,
}

impl ReviewRecord {
  /// Record for an item that has never been answered
  pub fn fresh(item_id: impl Into<String>, now: DateTime<Utc>) -> Self {
    Self {
      item_id: item_id.into(),
      interval: 0,
      ease_factor: INITIAL_EASE_FACTOR,
      repetitions: 0,
      next_review_at: now,
      last_review_at: now,
      correct_count: 0,
      incorrect_count: 0,
    }
  }

  pub fn is_due(&self, now: DateTime<Utc>) -> bool {
    self.next_review_at <= now
  }
}

/// How the learner answered, recorded with mistakes and completions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
  Typing,         // Free text input
  MultipleChoice, // Picked from a closed set
  Flip,           // Self-graded flashcard
}

impl StudyMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Typing => "typing",
      Self::MultipleChoice => "multiple_choice",
      Self::Flip => "flip",
    }
  }

  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "typing" => Some(Self::Typing),
      "multiple_choice" => Some(Self::MultipleChoice),
      "flip" => Some(Self::Flip),
      _ => None,
    }
  }
}
