//! Mistake persistence, bounded by write order

use rusqlite::{params, Connection, Result, Row};

use super::{format_ts, parse_ts};
use crate::domain::{Mistake, MistakeRecord, StudyMode};

fn row_to_mistake(row: &Row) -> Result<Option<MistakeRecord>> {
    let item_id: String = row.get(0)?;
    let mode: String = row.get(3)?;
    let timestamp: String = row.get(4)?;

    let (Some(mode), Some(timestamp)) = (StudyMode::from_str(&mode), parse_ts(&timestamp)) else {
        tracing::warn!("Skipping malformed mistake record for {}", item_id);
        return Ok(None);
    };

    Ok(Some(MistakeRecord {
        item_id,
        user_answer: row.get(1)?,
        correct_answer: row.get(2)?,
        mode,
        timestamp,
        mistake_count: row.get(5)?,
    }))
}

fn query_mistakes(conn: &Connection, sql: &str, limit: i64) -> Result<Vec<MistakeRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mistakes = stmt
        .query_map(params![limit], row_to_mistake)?
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();
    Ok(mistakes)
}

/// Insert a new mistake or bump the count of an existing one.
/// Either way the row becomes the most recently written.
pub fn upsert_mistake(conn: &Connection, mistake: &Mistake) -> Result<MistakeRecord> {
    let next_seq: i64 = conn.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM mistakes", [], |row| {
        row.get(0)
    })?;
    let timestamp = format_ts(&mistake.timestamp);

    // Try to update existing mistake first
    let updated = conn.execute(
        r#"
    UPDATE mistakes
    SET mistake_count = mistake_count + 1,
        user_answer = ?1,
        correct_answer = ?2,
        mode = ?3,
        timestamp = ?4,
        seq = ?5
    WHERE item_id = ?6
    "#,
        params![
            mistake.user_answer,
            mistake.correct_answer,
            mistake.mode.as_str(),
            timestamp,
            next_seq,
            mistake.item_id,
        ],
    )?;

    // If no existing row, insert new one
    if updated == 0 {
        conn.execute(
            r#"
      INSERT INTO mistakes (item_id, user_answer, correct_answer, mode, timestamp, mistake_count, seq)
      VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
      "#,
            params![
                mistake.item_id,
                mistake.user_answer,
                mistake.correct_answer,
                mistake.mode.as_str(),
                timestamp,
                next_seq,
            ],
        )?;
    }

    let mistake_count: i64 = conn.query_row(
        "SELECT mistake_count FROM mistakes WHERE item_id = ?1",
        params![mistake.item_id],
        |row| row.get(0),
    )?;

    Ok(MistakeRecord {
        item_id: mistake.item_id.clone(),
        user_answer: mistake.user_answer.clone(),
        correct_answer: mistake.correct_answer.clone(),
        mode: mistake.mode,
        timestamp: mistake.timestamp,
        mistake_count,
    })
}

/// Keep only the `max` most recently written mistakes; returns how many were dropped
pub fn trim_mistakes(conn: &Connection, max: usize) -> Result<usize> {
    conn.execute(
        r#"
    DELETE FROM mistakes
    WHERE item_id NOT IN (
      SELECT item_id FROM mistakes ORDER BY seq DESC LIMIT ?1
    )
    "#,
        params![max as i64],
    )
}

pub fn delete_mistake(conn: &Connection, item_id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM mistakes WHERE item_id = ?1", params![item_id])?;
    Ok(deleted > 0)
}

pub fn delete_all_mistakes(conn: &Connection) -> Result<usize> {
    conn.execute("DELETE FROM mistakes", [])
}

/// Oldest mistakes first (remedial review order)
pub fn get_mistakes_oldest_first(conn: &Connection, limit: usize) -> Result<Vec<MistakeRecord>> {
    query_mistakes(
        conn,
        r#"
    SELECT item_id, user_answer, correct_answer, mode, timestamp, mistake_count
    FROM mistakes
    ORDER BY timestamp ASC, seq ASC
    LIMIT ?1
    "#,
        limit as i64,
    )
}

/// Most frequently missed first; ties go to the most recent write
pub fn get_mistakes_by_frequency(conn: &Connection) -> Result<Vec<MistakeRecord>> {
    query_mistakes(
        conn,
        r#"
    SELECT item_id, user_answer, correct_answer, mode, timestamp, mistake_count
    FROM mistakes
    ORDER BY mistake_count DESC, seq DESC
    LIMIT ?1
    "#,
        -1,
    )
}

/// All mistakes, most recently written first
pub fn get_all_mistakes(conn: &Connection) -> Result<Vec<MistakeRecord>> {
    query_mistakes(
        conn,
        r#"
    SELECT item_id, user_answer, correct_answer, mode, timestamp, mistake_count
    FROM mistakes
    ORDER BY seq DESC
    LIMIT ?1
    "#,
        -1,
    )
}
