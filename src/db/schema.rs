use rusqlite::{Connection, Result};

pub fn run_migrations(conn: &Connection) -> Result<()> {
  // Complete schema for new stores; upgrades for older stores follow below
  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS review_records (
      item_id TEXT PRIMARY KEY,
      interval_days INTEGER NOT NULL DEFAULT 0,
      ease_factor REAL NOT NULL DEFAULT 2.5,
      repetitions INTEGER NOT NULL DEFAULT 0,
      next_review_at TEXT NOT NULL,
      last_review_at TEXT NOT NULL,
      correct_count INTEGER NOT NULL DEFAULT 0,
      incorrect_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS mistakes (
      item_id TEXT PRIMARY KEY,
      user_answer TEXT NOT NULL,
      correct_answer TEXT NOT NULL,
      mode TEXT NOT NULL,
      timestamp TEXT NOT NULL,
      mistake_count INTEGER NOT NULL DEFAULT 1,
      -- Write order, used for eviction
      seq INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS completion_queue (
      position INTEGER PRIMARY KEY,
      event_id TEXT NOT NULL,
      payload TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS settings (
      key TEXT PRIMARY KEY,
      value TEXT NOT NULL
    );

    -- Indexes
    CREATE INDEX IF NOT EXISTS idx_review_records_next_review ON review_records(next_review_at);
    CREATE INDEX IF NOT EXISTS idx_mistakes_timestamp ON mistakes(timestamp);
    "#,
  )?;

  // ============================================================
  // MIGRATIONS FOR EXISTING STORES
  // No-ops for new stores (columns already exist)
  // ============================================================

  // Migration: counters were added after the first release
  add_column_if_missing(conn, "review_records", "correct_count", "INTEGER NOT NULL DEFAULT 0")?;
  add_column_if_missing(conn, "review_records", "incorrect_count", "INTEGER NOT NULL DEFAULT 0")?;

  // Migration: eviction order for mistakes
  if !column_exists(conn, "mistakes", "seq") {
    add_column_if_missing(conn, "mistakes", "seq", "INTEGER NOT NULL DEFAULT 0")?;
    conn.execute("UPDATE mistakes SET seq = rowid", [])?;
  }
  conn.execute("CREATE INDEX IF NOT EXISTS idx_mistakes_seq ON mistakes(seq)", [])?;

  Ok(())
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
  conn
    .prepare(&format!("SELECT {} FROM {} LIMIT 1", column, table))
    .is_ok()
}

/// Add a column if it doesn't already exist
fn add_column_if_missing(conn: &Connection, table: &str, column: &str, column_def: &str) -> Result<()> {
  if !column_exists(conn, table, column) {
    conn.execute(
      &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def),
      [],
    )?;
  }
  Ok(())
}
