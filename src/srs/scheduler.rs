//! Review scheduling over stored review records.
//!
//! All ordering and stats are computed in memory from the records for the
//! requested ids. Store reads that fail are logged and the affected items are
//! treated as new; a failing store never blocks practice.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::sm2::calculate_sm2;
use crate::config::MASTERED_INTERVAL_DAYS;
use crate::db::{self, DbPool, LogOnError};
use crate::domain::ReviewRecord;
use crate::error::EngineError;

/// Priority group used by `review_queue`, in presentation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PriorityTier {
  Due,
  New,
  NotDue,
}

/// Aggregate counts for a set of items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SrsStats {
  pub due_today: usize,
  pub mastered: usize,
  pub learning: usize,
  pub new_cards: usize,
}

#[derive(Clone)]
pub struct SrsScheduler {
  pool: DbPool,
}

impl SrsScheduler {
  pub fn new(pool: DbPool) -> Self {
    Self { pool }
  }

  /// Apply one answer to the item's record, creating it on first answer
  pub fn record_result(&self, item_id: &str, is_correct: bool) -> ReviewRecord {
    self.record_result_at(item_id, is_correct, Utc::now())
  }

  pub fn record_result_at(&self, item_id: &str, is_correct: bool, now: DateTime<Utc>) -> ReviewRecord {
    let current = self
      .load_record(item_id)
      .unwrap_or_else(|| ReviewRecord::fresh(item_id, now));

    let result = calculate_sm2(
      is_correct,
      current.ease_factor,
      current.interval,
      current.repetitions,
      now,
    );

    let record = ReviewRecord {
      item_id: item_id.to_string(),
      interval: result.interval_days,
      ease_factor: result.ease_factor,
      repetitions: result.repetitions,
      next_review_at: result.next_review,
      last_review_at: now,
      correct_count: current.correct_count + i64::from(is_correct),
      incorrect_count: current.incorrect_count + i64::from(!is_correct),
    };

    if let Some(conn) = db::try_lock(&self.pool).log_warn("Review store unavailable") {
      db::upsert_review_record(&conn, &record).log_warn("Failed to save review record");
    }

    tracing::debug!(
      item_id,
      is_correct,
      interval = record.interval,
      ease = record.ease_factor,
      "Recorded review"
    );
    record
  }

  pub fn record(&self, item_id: &str) -> Option<ReviewRecord> {
    self.load_record(item_id)
  }

  /// Items with no record or whose next review is not in the future
  pub fn due_items(&self, item_ids: &[String]) -> HashSet<String> {
    self.due_items_at(item_ids, Utc::now())
  }

  pub fn due_items_at(&self, item_ids: &[String], now: DateTime<Utc>) -> HashSet<String> {
    let records = self.load_records(item_ids);
    item_ids
      .iter()
      .filter(|id| records.get(*id).is_none_or(|r| r.is_due(now)))
      .cloned()
      .collect()
  }

  /// Order items as due, then new, then not yet due.
  /// Within a tier earlier `next_review_at` comes first; ties keep input order.
  pub fn review_queue(&self, item_ids: &[String]) -> Vec<String> {
    self.review_queue_at(item_ids, Utc::now())
  }

  pub fn review_queue_at(&self, item_ids: &[String], now: DateTime<Utc>) -> Vec<String> {
    let records = self.load_records(item_ids);
    let mut keyed: Vec<((PriorityTier, Option<DateTime<Utc>>), &String)> = item_ids
      .iter()
      .map(|id| (priority_key(records.get(id), now), id))
      .collect();

    // Stable sort keeps input order for equal keys
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, id)| id.clone()).collect()
  }

  pub fn stats(&self, item_ids: &[String]) -> SrsStats {
    self.stats_at(item_ids, Utc::now())
  }

  pub fn stats_at(&self, item_ids: &[String], now: DateTime<Utc>) -> SrsStats {
    let records = self.load_records(item_ids);
    let mut stats = SrsStats::default();

    let unique: HashSet<&String> = item_ids.iter().collect();
    for id in unique {
      match records.get(id) {
        None => stats.new_cards += 1,
        Some(record) => {
          if record.is_due(now) {
            stats.due_today += 1;
          }
          if record.interval >= MASTERED_INTERVAL_DAYS {
            stats.mastered += 1;
          } else if record.interval > 0 {
            stats.learning += 1;
          }
        }
      }
    }
    stats
  }

  /// Delete every review record
  pub fn reset_all(&self) -> Result<usize, EngineError> {
    let conn = db::try_lock(&self.pool)?;
    let deleted = db::delete_all_review_records(&conn)?;
    tracing::info!("Reset {} review records", deleted);
    Ok(deleted)
  }

  fn load_record(&self, item_id: &str) -> Option<ReviewRecord> {
    let conn = db::try_lock(&self.pool).log_warn("Review store unavailable")?;
    db::get_review_record(&conn, item_id)
      .log_warn("Failed to read review record")
      .flatten()
  }

  fn load_records(&self, item_ids: &[String]) -> HashMap<String, ReviewRecord> {
    let Some(conn) = db::try_lock(&self.pool).log_warn("Review store unavailable") else {
      return HashMap::new();
    };
    db::get_review_records(&conn, item_ids).log_warn_default("Failed to read review records")
  }
}

fn priority_key(record: Option<&ReviewRecord>, now: DateTime<Utc>) -> (PriorityTier, Option<DateTime<Utc>>) {
  match record {
    None => (PriorityTier::New, None),
    Some(r) if r.is_due(now) => (PriorityTier::Due, Some(r.next_review_at)),
    Some(r) => (PriorityTier::NotDue, Some(r.next_review_at)),
  }
}
