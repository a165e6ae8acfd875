//! Durable FIFO of completion events with whole-batch delivery.
//!
//! Once hydrated, every change is written through to the store. Before
//! that, events are held in memory and nothing is sent. A flush sends the entire
//! pending batch in one request: success removes the delivered events,
//! failure leaves the queue exactly as it was. Retries resend the same full
//! batch with no backoff.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::client::CompletionSubmitter;
use crate::config::EngineConfig;
use crate::db::{self, DbPool, LogOnError};
use crate::domain::{CompletionDraft, CompletionEvent};
use crate::error::EngineError;

/// Whether a delivery request is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
  Idle,
  InFlight,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
  /// Number of events the aggregator accepted
  Delivered(usize),
  Empty,
  /// Persisted events not loaded yet; nothing was sent
  NotHydrated,
  /// Collapsed into the request already in flight
  AlreadyInFlight,
  Failed(EngineError),
}

impl FlushOutcome {
  pub fn error(&self) -> Option<EngineError> {
    match self {
      Self::Failed(e) => Some(e.clone()),
      Self::AlreadyInFlight => Some(EngineError::ConcurrencyNoop),
      _ => None,
    }
  }
}

/// Observable queue state
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatus {
  pub pending: usize,
  pub last_error: Option<String>,
  pub last_synced_at: Option<DateTime<Utc>>,
  /// Last time the stored queue was rewritten
  pub updated_at: Option<DateTime<Utc>>,
  pub flush_state: FlushState,
  pub hydrated: bool,
}

struct QueueInner {
  events: Vec<CompletionEvent>,
  flush_state: FlushState,
  last_error: Option<String>,
  last_synced_at: Option<DateTime<Utc>>,
  updated_at: Option<DateTime<Utc>>,
  hydrated: bool,
}

pub struct CompletionQueue {
  pool: DbPool,
  submitter: Arc<dyn CompletionSubmitter>,
  endpoint: Option<String>,
  max_len: usize,
  auto_flush: bool,
  inner: Mutex<QueueInner>,
}

/// Returns the queue to `Idle` when the flush ends, including on cancellation
struct InFlightGuard<'a> {
  queue: &'a CompletionQueue,
}

impl Drop for InFlightGuard<'_> {
  fn drop(&mut self) {
    self.queue.inner().flush_state = FlushState::Idle;
  }
}

impl CompletionQueue {
  pub fn new(pool: DbPool, submitter: Arc<dyn CompletionSubmitter>, config: &EngineConfig) -> Arc<Self> {
    Arc::new(Self {
      pool,
      submitter,
      endpoint: config.sync_endpoint.clone(),
      max_len: config.max_queue_len.max(1),
      auto_flush: config.auto_flush,
      inner: Mutex::new(QueueInner {
        events: Vec::new(),
        flush_state: FlushState::Idle,
        last_error: None,
        last_synced_at: None,
        updated_at: None,
        hydrated: false,
      }),
    })
  }

  fn inner(&self) -> MutexGuard<'_, QueueInner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Load persisted events. Anything enqueued before hydration is kept
  /// behind the persisted events. An unreadable store counts as empty.
  ///
  /// The store is not written until this has run, so early enqueues never
  /// overwrite events left by a previous process.
  pub fn hydrate(&self) -> Result<usize, EngineError> {
    let loaded = db::try_lock(&self.pool)
      .map_err(EngineError::from)
      .and_then(|conn| {
        let events = db::load_queue(&conn)?;
        let last_synced_at = db::get_last_synced_at(&conn)?;
        let updated_at = db::get_queue_updated_at(&conn)?;
        Ok((events, last_synced_at, updated_at))
      });

    let mut inner = self.inner();
    inner.hydrated = true;

    let (stored, last_synced_at, updated_at) = match loaded {
      Ok(loaded) => loaded,
      Err(e) => {
        tracing::warn!("Failed to hydrate completion queue: {}", e);
        inner.last_error = Some(e.to_string());
        return Err(e);
      }
    };

    let early = std::mem::take(&mut inner.events);
    let stored_ids: HashSet<Uuid> = stored.iter().map(|e| e.id).collect();
    let had_early = !early.is_empty();
    inner.events = stored;
    inner
      .events
      .extend(early.into_iter().filter(|e| !stored_ids.contains(&e.id)));
    inner.last_synced_at = inner.last_synced_at.or(last_synced_at);
    inner.updated_at = updated_at;

    let trimmed = self.trim(&mut inner);
    if had_early || trimmed > 0 {
      self.persist(&mut inner);
    }

    tracing::debug!("Hydrated completion queue with {} pending", inner.events.len());
    Ok(inner.events.len())
  }

  /// Queue a session summary; the first event into an empty queue also
  /// starts a background flush
  pub fn enqueue(self: &Arc<Self>, draft: CompletionDraft) -> CompletionEvent {
    let event = CompletionEvent::from_draft(draft, Utc::now());

    let (was_empty, hydrated) = {
      let mut inner = self.inner();
      let was_empty = inner.events.is_empty();
      inner.events.push(event.clone());
      self.trim(&mut inner);
      self.persist(&mut inner);
      (was_empty, inner.hydrated)
    };

    tracing::debug!(event_id = %event.id, deck_id = %event.deck_id, "Queued completion");

    if was_empty && hydrated && self.auto_flush {
      self.spawn_flush("first pending completion");
    }
    event
  }

  /// Attempt delivery of the whole pending batch. Never fails the caller:
  /// errors come back in the outcome and are kept as `last_error`.
  pub async fn flush(&self) -> FlushOutcome {
    let (endpoint, batch) = {
      let mut inner = self.inner();
      if !inner.hydrated {
        tracing::debug!("Completion queue not hydrated; flush skipped");
        return FlushOutcome::NotHydrated;
      }
      if inner.flush_state == FlushState::InFlight {
        tracing::debug!("Flush already in flight; skipping");
        return FlushOutcome::AlreadyInFlight;
      }
      if inner.events.is_empty() {
        return FlushOutcome::Empty;
      }
      let Some(endpoint) = self.endpoint.clone() else {
        tracing::warn!("Cannot flush {} completions: no sync endpoint", inner.events.len());
        inner.last_error = Some(EngineError::Config.to_string());
        return FlushOutcome::Failed(EngineError::Config);
      };
      inner.flush_state = FlushState::InFlight;
      (endpoint, inner.events.clone())
    };

    let _guard = InFlightGuard { queue: self };
    let result = self.submitter.submit(&endpoint, &batch).await;

    let mut inner = self.inner();
    match result {
      Ok(()) => {
        let delivered: HashSet<Uuid> = batch.iter().map(|e| e.id).collect();
        inner.events.retain(|e| !delivered.contains(&e.id));
        let now = Utc::now();
        inner.last_synced_at = Some(now);
        inner.last_error = None;
        self.persist(&mut inner);
        if let Ok(conn) = db::try_lock(&self.pool) {
          db::set_last_synced_at(&conn, Some(now)).log_warn("Failed to save last sync time");
        }
        tracing::info!("Delivered {} completions", batch.len());
        FlushOutcome::Delivered(batch.len())
      }
      Err(e) => {
        tracing::warn!("Completion delivery failed, {} kept for retry: {}", batch.len(), e);
        inner.last_error = Some(e.to_string());
        FlushOutcome::Failed(e)
      }
    }
  }

  /// Start a flush on the current tokio runtime without waiting for it
  pub fn spawn_flush(self: &Arc<Self>, reason: &'static str) {
    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        tracing::debug!("Flush triggered: {}", reason);
        let queue = Arc::clone(self);
        handle.spawn(async move {
          queue.flush().await;
        });
      }
      Err(_) => tracing::debug!("No async runtime; flush for {} deferred", reason),
    }
  }

  /// Drop everything (sign-out); nothing is delivered
  pub fn clear(&self) -> Result<(), EngineError> {
    let mut inner = self.inner();
    inner.events.clear();
    inner.last_error = None;
    inner.last_synced_at = None;

    let now = Utc::now();
    let conn = db::try_lock(&self.pool)?;
    db::clear_queue(&conn, now)?;
    inner.updated_at = Some(now);
    db::set_last_synced_at(&conn, None)?;
    tracing::info!("Completion queue cleared");
    Ok(())
  }

  pub fn pending(&self) -> Vec<CompletionEvent> {
    self.inner().events.clone()
  }

  pub fn len(&self) -> usize {
    self.inner().events.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner().events.is_empty()
  }

  pub fn is_hydrated(&self) -> bool {
    self.inner().hydrated
  }

  pub fn flush_state(&self) -> FlushState {
    self.inner().flush_state
  }

  pub fn last_error(&self) -> Option<String> {
    self.inner().last_error.clone()
  }

  pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
    self.inner().last_synced_at
  }

  pub fn status(&self) -> QueueStatus {
    let inner = self.inner();
    QueueStatus {
      pending: inner.events.len(),
      last_error: inner.last_error.clone(),
      last_synced_at: inner.last_synced_at,
      updated_at: inner.updated_at,
      flush_state: inner.flush_state,
      hydrated: inner.hydrated,
    }
  }

  /// Drop the oldest events beyond the limit
  fn trim(&self, inner: &mut QueueInner) -> usize {
    let overflow = inner.events.len().saturating_sub(self.max_len);
    if overflow > 0 {
      for dropped in inner.events.drain(..overflow) {
        tracing::warn!(event_id = %dropped.id, "Completion queue full; dropping oldest event");
      }
    }
    overflow
  }

  /// Write the queue through to the store; held in memory until hydrated
  fn persist(&self, inner: &mut QueueInner) {
    if !inner.hydrated {
      return;
    }
    let now = Utc::now();
    let saved = db::try_lock(&self.pool)
      .map_err(EngineError::from)
      .and_then(|conn| Ok(db::save_queue(&conn, &inner.events, now)?));
    match saved {
      Ok(()) => inner.updated_at = Some(now),
      Err(e) => {
        tracing::warn!("Failed to persist completion queue: {}", e);
        inner.last_error = Some(e.to_string());
      }
    }
  }
}
