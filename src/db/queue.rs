//! Completion queue persistence

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result};

use super::{delete_setting, format_ts, get_setting, parse_ts, set_setting};
use crate::domain::CompletionEvent;

const QUEUE_UPDATED_KEY: &str = "completion_queue_updated_at";
const LAST_SYNCED_KEY: &str = "completion_last_synced_at";

/// Replace the persisted queue with `events`, in order
pub fn save_queue(conn: &Connection, events: &[CompletionEvent], now: DateTime<Utc>) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM completion_queue", [])?;
    {
        let mut stmt =
            tx.prepare("INSERT INTO completion_queue (position, event_id, payload) VALUES (?1, ?2, ?3)")?;
        for (position, event) in events.iter().enumerate() {
            let payload =
                serde_json::to_string(event).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            stmt.execute(params![position as i64, event.id.to_string(), payload])?;
        }
    }
    set_setting(&tx, QUEUE_UPDATED_KEY, &format_ts(&now))?;
    tx.commit()
}

/// Load the persisted queue in FIFO order; unreadable entries are dropped
pub fn load_queue(conn: &Connection) -> Result<Vec<CompletionEvent>> {
    let mut stmt = conn.prepare("SELECT event_id, payload FROM completion_queue ORDER BY position ASC")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>>>()?;

    let events = rows
        .into_iter()
        .filter_map(|(event_id, payload)| match serde_json::from_str(&payload) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("Dropping unreadable queued completion {}: {}", event_id, e);
                None
            }
        })
        .collect();
    Ok(events)
}

pub fn clear_queue(conn: &Connection, now: DateTime<Utc>) -> Result<()> {
    conn.execute("DELETE FROM completion_queue", [])?;
    set_setting(conn, QUEUE_UPDATED_KEY, &format_ts(&now))
}

pub fn get_queue_updated_at(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    Ok(get_setting(conn, QUEUE_UPDATED_KEY)?.as_deref().and_then(parse_ts))
}

pub fn get_last_synced_at(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    Ok(get_setting(conn, LAST_SYNCED_KEY)?.as_deref().and_then(parse_ts))
}

pub fn set_last_synced_at(conn: &Connection, at: Option<DateTime<Utc>>) -> Result<()> {
    match at {
        Some(at) => set_setting(conn, LAST_SYNCED_KEY, &format_ts(&at)),
        None => delete_setting(conn, LAST_SYNCED_KEY),
    }
}
