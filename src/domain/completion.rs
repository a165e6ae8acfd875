use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Category, Direction, StudyMode};

/// Session summary as produced by the session, before it is queued
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionDraft {
  pub deck_id: String,
  pub category: Category,
  pub mode: StudyMode,
  pub direction: Direction,
  pub correct_count: u32,
  pub total_attempts: u32,
  pub accuracy: f64,
  pub streak_delta: i32,
  pub xp_earned: f64,
  pub hearts_remaining: u32,
  /// Defaults to enqueue time when unset
  pub completed_at: Option<DateTime<Utc>>,
}

/// Immutable queued record of one finished session.
///
/// Serialized in camelCase; this is the wire format posted to the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
  pub id: Uuid,
  pub deck_id: String,
  pub category: Category,
  pub mode: StudyMode,
  pub direction: Direction,
  pub correct_count: u32,
  pub total_attempts: u32,
  pub accuracy: u32,
  pub streak_delta: i32,
  pub xp_earned: u32,
  pub hearts_remaining: u32,
  pub completed_at: DateTime<Utc>,
}

impl CompletionEvent {
  /// Build an event from a draft: fresh id, accuracy clamped to 0..=100,
  /// xp rounded and floored at zero.
  pub fn from_draft(draft: CompletionDraft, now: DateTime<Utc>) -> Self {
    let accuracy = if draft.accuracy.is_finite() {
      draft.accuracy.round().clamp(0.0, 100.0) as u32
    } else {
      0
    };
    let xp_earned = if draft.xp_earned.is_finite() {
      draft.xp_earned.round().max(0.0) as u32
    } else {
      0
    };

    Self {
      id: Uuid::new_v4(),
      deck_id: draft.deck_id,
      category: draft.category,
      mode: draft.mode,
      direction: draft.direction,
      correct_count: draft.correct_count,
      total_attempts: draft.total_attempts,
      accuracy,
      streak_delta: draft.streak_delta,
      xp_earned,
      hearts_remaining: draft.hearts_remaining,
      completed_at: draft.completed_at.unwrap_or(now),
    }
  }
}
