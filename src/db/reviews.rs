//! Review record persistence (one row per practice item)

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::collections::HashMap;

use super::{format_ts, parse_ts};
use crate::domain::ReviewRecord;

const SELECT_COLUMNS: &str = "item_id, interval_days, ease_factor, repetitions, next_review_at, \
                              last_review_at, correct_count, incorrect_count";

/// Map a row to a record; rows with unreadable timestamps are treated as missing
fn row_to_record(row: &Row) -> Result<Option<ReviewRecord>> {
    let item_id: String = row.get(0)?;
    let next: String = row.get(4)?;
    let last: String = row.get(5)?;

    let (Some(next_review_at), Some(last_review_at)) = (parse_ts(&next), parse_ts(&last)) else {
        tracing::warn!("Skipping malformed review record for {}", item_id);
        return Ok(None);
    };

    Ok(Some(ReviewRecord {
        item_id,
        interval: row.get::<_, i64>(1)?.max(0),
        ease_factor: row.get(2)?,
        repetitions: row.get::<_, i64>(3)?.max(0),
        next_review_at,
        last_review_at,
        correct_count: row.get(6)?,
        incorrect_count: row.get(7)?,
    }))
}

pub fn get_review_record(conn: &Connection, item_id: &str) -> Result<Option<ReviewRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {} FROM review_records WHERE item_id = ?1", SELECT_COLUMNS),
            params![item_id],
            row_to_record,
        )
        .optional()?;
    Ok(record.flatten())
}

/// Load records for the given ids; ids without a (readable) record are absent
pub fn get_review_records(conn: &Connection, item_ids: &[String]) -> Result<HashMap<String, ReviewRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM review_records WHERE item_id = ?1",
        SELECT_COLUMNS
    ))?;

    let mut records = HashMap::with_capacity(item_ids.len());
    for item_id in item_ids {
        if records.contains_key(item_id) {
            continue;
        }
        if let Some(record) = stmt.query_row(params![item_id], row_to_record).optional()?.flatten() {
            records.insert(item_id.clone(), record);
        }
    }
    Ok(records)
}

pub fn upsert_review_record(conn: &Connection, record: &ReviewRecord) -> Result<()> {
    conn.execute(
        r#"
    INSERT INTO review_records
      (item_id, interval_days, ease_factor, repetitions, next_review_at, last_review_at,
       correct_count, incorrect_count)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(item_id) DO UPDATE SET
      interval_days = excluded.interval_days,
      ease_factor = excluded.ease_factor,
      repetitions = excluded.repetitions,
      next_review_at = excluded.next_review_at,
      last_review_at = excluded.last_review_at,
      correct_count = excluded.correct_count,
      incorrect_count = excluded.incorrect_count
    "#,
        params![
            record.item_id,
            record.interval,
            record.ease_factor,
            record.repetitions,
            format_ts(&record.next_review_at),
            format_ts(&record.last_review_at),
            record.correct_count,
            record.incorrect_count,
        ],
    )?;
    Ok(())
}

/// Explicit full reset; the only way records are ever deleted
pub fn delete_all_review_records(conn: &Connection) -> Result<usize> {
    conn.execute("DELETE FROM review_records", [])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;
    use chrono::{Duration, Utc};

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_upsert_then_get() {
        let conn = conn();
        let now = Utc::now();
        let mut record = ReviewRecord::fresh("v1", now);
        record.interval = 6;
        record.next_review_at = now + Duration::days(6);
        upsert_review_record(&conn, &record).unwrap();

        record.correct_count = 2;
        upsert_review_record(&conn, &record).unwrap();

        let loaded = get_review_record(&conn, "v1").unwrap().unwrap();
        assert_eq!(loaded.interval, 6);
        assert_eq!(loaded.correct_count, 2);
        assert_eq!(format_ts(&loaded.next_review_at), format_ts(&record.next_review_at));
    }

    #[test]
    fn test_missing_record_is_none() {
        let conn = conn();
        assert!(get_review_record(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn test_malformed_row_is_treated_as_missing() {
        let conn = conn();
        conn.execute(
            "INSERT INTO review_records (item_id, next_review_at, last_review_at) VALUES ('bad', 'garbage', 'garbage')",
            [],
        )
        .unwrap();

        assert!(get_review_record(&conn, "bad").unwrap().is_none());
        let many = get_review_records(&conn, &["bad".to_string()]).unwrap();
        assert!(many.is_empty());
    }

    #[test]
    fn test_delete_all() {
        let conn = conn();
        let now = Utc::now();
        upsert_review_record(&conn, &ReviewRecord::fresh("a", now)).unwrap();
        upsert_review_record(&conn, &ReviewRecord::fresh("b", now)).unwrap();
        assert_eq!(delete_all_review_records(&conn).unwrap(), 2);
        assert!(get_review_record(&conn, "a").unwrap().is_none());
        assert!(get_review_record(&conn, "b").unwrap().is_none());
    }
}
