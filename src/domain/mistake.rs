use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StudyMode;

/// A recently missed item, upserted by item id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MistakeRecord {
  pub item_id: String,
  pub user_answer: String,
  pub correct_answer: String,
  pub mode: StudyMode,
  pub timestamp: DateTime<Utc>,
  pub mistake_count: i64,
}

/// Input to `MistakeTracker::record`; the count is managed by the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct Mistake {
  pub item_id: String,
  pub user_answer: String,
  pub correct_answer: String,
  pub mode: StudyMode,
  pub timestamp: DateTime<Utc>,
}

impl Mistake {
  pub fn new(
    item_id: impl Into<String>,
    user_answer: impl Into<String>,
    correct_answer: impl Into<String>,
    mode: StudyMode,
  ) -> Self {
    Self {
      item_id: item_id.into(),
      user_answer: user_answer.into(),
      correct_answer: correct_answer.into(),
      mode,
      timestamp: Utc::now(),
    }
  }

  pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
    self.timestamp = timestamp;
    self
  }
}
