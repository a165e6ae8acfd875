//! Engine configuration constants.
//!
//! Tunables for scheduling, sessions and sync live here, together with the
//! loader for the runtime `EngineConfig`.

use serde::Deserialize;
use std::path::PathBuf;

// ==================== SRS Configuration ====================

/// Ease factor assigned to a record on its first answer
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// Lower ease bound
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Upper ease bound
pub const MAX_EASE_FACTOR: f64 = 2.8;

/// Ease penalty for an incorrect answer
pub const EASE_PENALTY: f64 = 0.2;

/// Ease bonus for a correct answer on a mature item
pub const EASE_BONUS: f64 = 0.05;

/// Interval (days) at which an item counts as mastered
pub const MASTERED_INTERVAL_DAYS: i64 = 21;

// ==================== Mistake Configuration ====================

/// Number of mistake records kept in the store
pub const MAX_MISTAKES: usize = 100;

// ==================== Session Configuration ====================

/// Hearts granted at session start
pub const DEFAULT_HEARTS: u32 = 3;

/// Correct answers needed to complete a session
pub const DEFAULT_TARGET: u32 = 10;

/// XP per correct answer
pub const XP_PER_CORRECT: f64 = 10.0;

/// XP bonus for reaching the session target
pub const COMPLETION_BONUS_XP: f64 = 20.0;

// ==================== Sync Configuration ====================

/// Maximum number of completion events held for delivery
pub const MAX_QUEUE_LEN: usize = 25;

/// Periodic flush interval in seconds
pub const FLUSH_INTERVAL_SECS: u64 = 60;

/// Default store location
pub const DEFAULT_DB_PATH: &str = "data/practice.db";

// ==================== Runtime Configuration ====================

/// Configuration file structure for config.toml
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
  engine: Option<EngineSection>,
}

#[derive(Debug, Default, Deserialize)]
struct EngineSection {
  database_path: Option<String>,
  sync_endpoint: Option<String>,
  sync_token: Option<String>,
  max_queue_len: Option<usize>,
  max_mistakes: Option<usize>,
  flush_interval_secs: Option<u64>,
}

/// Runtime settings shared by the engine components
#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub database_path: PathBuf,
  /// Remote aggregator URL; flushes record a config error while unset
  pub sync_endpoint: Option<String>,
  pub sync_token: Option<String>,
  pub max_queue_len: usize,
  pub max_mistakes: usize,
  pub flush_interval_secs: u64,
  /// Flush in the background when the queue goes from empty to non-empty
  pub auto_flush: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      database_path: PathBuf::from(DEFAULT_DB_PATH),
      sync_endpoint: None,
      sync_token: None,
      max_queue_len: MAX_QUEUE_LEN,
      max_mistakes: MAX_MISTAKES,
      flush_interval_secs: FLUSH_INTERVAL_SECS,
      auto_flush: true,
    }
  }
}

impl EngineConfig {
  /// Load configuration with priority: config.toml > .env / environment > default
  pub fn load() -> Self {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let file = std::fs::read_to_string("config.toml")
      .ok()
      .and_then(|contents| match toml::from_str::<FileConfig>(&contents) {
        Ok(config) => Some(config),
        Err(e) => {
          tracing::warn!("Ignoring malformed config.toml: {}", e);
          None
        }
      })
      .and_then(|config| config.engine)
      .unwrap_or_default();

    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

    let database_path = file
      .database_path
      .or_else(|| env("PRACTICE_DB_PATH"))
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    tracing::info!("Using practice store at {}", database_path.display());

    let sync_endpoint = file.sync_endpoint.or_else(|| env("PRACTICE_SYNC_ENDPOINT"));
    if sync_endpoint.is_none() {
      tracing::warn!("No sync endpoint configured; completions will stay queued");
    }

    Self {
      database_path,
      sync_endpoint,
      sync_token: file.sync_token.or_else(|| env("PRACTICE_SYNC_TOKEN")),
      max_queue_len: file.max_queue_len.unwrap_or(MAX_QUEUE_LEN).max(1),
      max_mistakes: file.max_mistakes.unwrap_or(MAX_MISTAKES).max(1),
      flush_interval_secs: file.flush_interval_secs.unwrap_or(FLUSH_INTERVAL_SECS).max(1),
      auto_flush: true,
    }
  }

  /// Builder-style override of the sync endpoint
  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.sync_endpoint = Some(endpoint.into());
    self
  }
}
