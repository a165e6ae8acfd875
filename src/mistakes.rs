//! Bounded tracker of recently missed items.
//!
//! Feeds remedial decks. Writes keep only the most recently written
//! `max_mistakes` records; reads that fail degrade to an empty list.

use crate::config::MAX_MISTAKES;
use crate::db::{self, DbPool, LogOnError};
use crate::domain::{Mistake, MistakeRecord};
use crate::error::EngineError;

#[derive(Clone)]
pub struct MistakeTracker {
  pool: DbPool,
  max_mistakes: usize,
}

impl MistakeTracker {
  pub fn new(pool: DbPool) -> Self {
    Self::with_limit(pool, MAX_MISTAKES)
  }

  pub fn with_limit(pool: DbPool, max_mistakes: usize) -> Self {
    Self {
      pool,
      max_mistakes: max_mistakes.max(1),
    }
  }

  /// Most records kept at once
  pub fn limit(&self) -> usize {
    self.max_mistakes
  }

  /// Upsert a miss: repeats bump `mistake_count` and refresh the answer fields
  pub fn record(&self, mistake: &Mistake) -> Result<MistakeRecord, EngineError> {
    let conn = db::try_lock(&self.pool)?;
    let tx = conn.unchecked_transaction()?;
    let record = db::upsert_mistake(&tx, mistake)?;
    let evicted = db::trim_mistakes(&tx, self.max_mistakes)?;
    tx.commit()?;

    if evicted > 0 {
      tracing::debug!("Evicted {} oldest mistakes", evicted);
    }
    Ok(record)
  }

  /// Forget an item's mistake, typically after it was answered correctly
  pub fn clear(&self, item_id: &str) -> Result<bool, EngineError> {
    let conn = db::try_lock(&self.pool)?;
    Ok(db::delete_mistake(&conn, item_id)?)
  }

  /// Oldest mistakes first, for remedial decks
  pub fn for_review(&self, limit: usize) -> Vec<MistakeRecord> {
    let Some(conn) = db::try_lock(&self.pool).log_warn("Mistake store unavailable") else {
      return Vec::new();
    };
    db::get_mistakes_oldest_first(&conn, limit).log_warn_default("Failed to read mistakes")
  }

  /// Most frequently missed first
  pub fn by_frequency(&self) -> Vec<MistakeRecord> {
    let Some(conn) = db::try_lock(&self.pool).log_warn("Mistake store unavailable") else {
      return Vec::new();
    };
    db::get_mistakes_by_frequency(&conn).log_warn_default("Failed to read mistakes")
  }

  pub fn all(&self) -> Vec<MistakeRecord> {
    let Some(conn) = db::try_lock(&self.pool).log_warn("Mistake store unavailable") else {
      return Vec::new();
    };
    db::get_all_mistakes(&conn).log_warn_default("Failed to read mistakes")
  }

  pub fn reset_all(&self) -> Result<usize, EngineError> {
    let conn = db::try_lock(&self.pool)?;
    Ok(db::delete_all_mistakes(&conn)?)
  }
}
