use thiserror::Error;

use crate::db::DbLockError;

/// Failures surfaced at component boundaries.
///
/// None of these interrupt a practice session; they are logged and kept as
/// the queue's `last_error`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
  #[error("No sync endpoint configured")]
  Config,
  #[error("Network error: {0}")]
  Network(String),
  #[error("Persistence error: {0}")]
  Persistence(String),
  #[error("Flush already in flight")]
  ConcurrencyNoop,
}

impl From<rusqlite::Error> for EngineError {
  fn from(e: rusqlite::Error) -> Self {
    Self::Persistence(e.to_string())
  }
}

impl From<serde_json::Error> for EngineError {
  fn from(e: serde_json::Error) -> Self {
    Self::Persistence(e.to_string())
  }
}

impl From<DbLockError> for EngineError {
  fn from(e: DbLockError) -> Self {
    Self::Persistence(e.to_string())
  }
}

impl From<reqwest::Error> for EngineError {
  fn from(e: reqwest::Error) -> Self {
    Self::Network(e.to_string())
  }
}
