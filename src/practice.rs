//! Practice coordinator.
//!
//! Owns one session and forwards every answer outcome to the scheduler and
//! the mistake tracker before returning. When a run ends (completed, out of
//! hearts, or exited early) its summary goes to the completion queue.

use std::sync::Arc;

use crate::config::{EngineConfig, DEFAULT_HEARTS, DEFAULT_TARGET};
use crate::db::{self, DbPool, LogOnError};
use crate::deck::{self, DeckOptions};
use crate::domain::{CompletionEvent, Mistake, PracticeItem, StudyMode};
use crate::error::EngineError;
use crate::mistakes::MistakeTracker;
use crate::session::{self, AnswerOutcome, SessionError, SessionMachine, SessionMeta, SessionStatus};
use crate::srs::SrsScheduler;
use crate::sync::{CompletionQueue, CompletionSubmitter};
use crate::validation::AnswerEvaluator;

pub struct PracticeEngine {
  pool: DbPool,
  scheduler: SrsScheduler,
  mistakes: MistakeTracker,
  queue: Arc<CompletionQueue>,
  session: SessionMachine,
  meta: Option<SessionMeta>,
  /// Summary of the current run already queued
  summary_queued: bool,
}

impl PracticeEngine {
  pub fn new(pool: DbPool, queue: Arc<CompletionQueue>, config: &EngineConfig) -> Self {
    Self {
      scheduler: SrsScheduler::new(pool.clone()),
      mistakes: MistakeTracker::with_limit(pool.clone(), config.max_mistakes),
      pool,
      queue,
      session: SessionMachine::default(),
      meta: None,
      summary_queued: false,
    }
  }

  /// Open the store at `config.database_path` and hydrate the completion queue
  pub fn open(config: &EngineConfig, submitter: Arc<dyn CompletionSubmitter>) -> Result<Self, EngineError> {
    let pool = db::init_db(&config.database_path)?;
    let queue = CompletionQueue::new(pool.clone(), submitter, config);
    queue.hydrate().log_warn("Starting with an empty completion queue");
    Ok(Self::new(pool, queue, config))
  }

  pub fn with_evaluator(mut self, evaluator: Arc<dyn AnswerEvaluator>) -> Self {
    self.session = SessionMachine::new(evaluator);
    self
  }

  pub fn build_deck(&self, candidates: &[PracticeItem], options: DeckOptions) -> Vec<PracticeItem> {
    deck::assemble_deck(candidates, &self.scheduler, &self.mistakes, options)
  }

  pub fn remedial_deck(&self, candidates: &[PracticeItem], limit: usize) -> Vec<PracticeItem> {
    deck::remedial_deck(candidates, &self.mistakes, limit)
  }

  pub fn start(
    &mut self,
    meta: SessionMeta,
    deck: Vec<PracticeItem>,
    hearts: Option<u32>,
    target: Option<u32>,
  ) -> Result<(), SessionError> {
    self.session.start(
      deck,
      hearts.unwrap_or(DEFAULT_HEARTS),
      target.unwrap_or(DEFAULT_TARGET),
    )?;
    tracing::info!(deck_id = %meta.deck_id, "Practice session started");
    self.meta = Some(meta);
    self.summary_queued = false;
    self.save_snapshot();
    Ok(())
  }

  /// Pick up a saved session. Returns false when there is nothing to resume.
  pub fn resume(&mut self, meta: SessionMeta, items: &[PracticeItem]) -> bool {
    let snapshot = match session::load_snapshot(&self.pool) {
      Ok(Some(snapshot)) => snapshot,
      Ok(None) => return false,
      Err(e) => {
        tracing::warn!("Failed to load session snapshot: {}", e);
        return false;
      }
    };
    if snapshot.status != SessionStatus::Active {
      return false;
    }

    match self.session.restore(&snapshot, items) {
      Ok(()) => {
        tracing::info!(deck_id = %meta.deck_id, "Resumed practice session");
        self.meta = Some(meta);
        self.summary_queued = false;
        true
      }
      Err(e) => {
        tracing::warn!("Discarding unusable session snapshot: {}", e);
        session::clear_snapshot(&self.pool).log_warn("Failed to clear session snapshot");
        false
      }
    }
  }

  /// Grade an answer and record it everywhere before returning
  pub fn submit(&mut self, value: &str) -> Result<AnswerOutcome, SessionError> {
    let outcome = self.session.submit_answer(value)?;
    let item_id = outcome.item.id.as_str();

    self.scheduler.record_result(item_id, outcome.is_correct());
    if outcome.is_correct() {
      self.mistakes.clear(item_id).log_warn("Failed to clear mistake");
    } else {
      let mode = self.meta.as_ref().map_or(StudyMode::Typing, |m| m.mode);
      let mistake = Mistake::new(item_id, value, outcome.item.expected_answer(), mode);
      self.mistakes.record(&mistake).log_warn("Failed to record mistake");
    }

    if outcome.transition.is_some() {
      self.queue_summary();
      session::clear_snapshot(&self.pool).log_warn("Failed to clear session snapshot");
    } else {
      self.save_snapshot();
    }
    Ok(outcome)
  }

  pub fn advance(&mut self) {
    self.session.advance();
    self.save_snapshot();
  }

  pub fn skip(&mut self) {
    self.session.skip();
    self.save_snapshot();
  }

  /// Keep practicing after a completed run; the next run gets its own summary
  pub fn continue_session(&mut self) -> Result<(), SessionError> {
    self.session.continue_session()?;
    self.summary_queued = false;
    self.save_snapshot();
    Ok(())
  }

  /// Start over after game over with the same deck
  pub fn retry(&mut self) {
    self.session.reset();
    self.summary_queued = false;
    self.save_snapshot();
  }

  /// Leave the session. Queues a summary if any answer was given and none
  /// was queued yet, then returns the session to idle.
  pub fn exit(&mut self) -> Option<CompletionEvent> {
    let event = if self.session.total_attempts() > 0 {
      self.queue_summary()
    } else {
      None
    };
    self.session.end();
    session::clear_snapshot(&self.pool).log_warn("Failed to clear session snapshot");
    self.meta = None;
    self.summary_queued = false;
    event
  }

  pub fn session(&self) -> &SessionMachine {
    &self.session
  }

  pub fn scheduler(&self) -> &SrsScheduler {
    &self.scheduler
  }

  pub fn mistakes(&self) -> &MistakeTracker {
    &self.mistakes
  }

  pub fn queue(&self) -> &Arc<CompletionQueue> {
    &self.queue
  }

  fn queue_summary(&mut self) -> Option<CompletionEvent> {
    if self.summary_queued {
      return None;
    }
    let meta = self.meta.as_ref()?;
    let event = self.queue.enqueue(self.session.summary(meta));
    self.summary_queued = true;
    tracing::info!(
      deck_id = %event.deck_id,
      correct = event.correct_count,
      attempts = event.total_attempts,
      "Session summary queued"
    );
    Some(event)
  }

  /// Only live sessions are resumable
  fn save_snapshot(&self) {
    if self.session.status() != SessionStatus::Active {
      return;
    }
    session::save_snapshot(&self.pool, &self.session.snapshot()).log_warn("Failed to save session snapshot");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Category, Direction};
  use crate::testing::{items, test_config, MockSubmitter};
  use crate::sync::FlushOutcome;

  fn meta() -> SessionMeta {
    SessionMeta {
      deck_id: "basics".into(),
      category: Category::Vocabulary,
      mode: StudyMode::Typing,
      direction: Direction::TermToMeaning,
    }
  }

  fn engine() -> (PracticeEngine, Arc<MockSubmitter>) {
    let config = test_config();
    let pool = db::init_memory_db().unwrap();
    let submitter = MockSubmitter::succeeding();
    let queue = CompletionQueue::new(pool.clone(), submitter.clone(), &config);
    queue.hydrate().unwrap();
    (PracticeEngine::new(pool, queue, &config), submitter)
  }

  fn answer(engine: &PracticeEngine) -> String {
    engine.session().current_card().unwrap().meaning.clone()
  }

  #[tokio::test]
  async fn test_outcomes_reach_scheduler_and_tracker() {
    let (mut engine, _) = engine();
    engine.start(meta(), items(3), Some(3), Some(10)).unwrap();

    engine.submit("wrong").unwrap();
    let record = engine.scheduler().record("v0").unwrap();
    assert_eq!(record.incorrect_count, 1);
    let missed = engine.mistakes().all();
    assert_eq!(missed.len(), 1);
    assert_eq!(missed[0].user_answer, "wrong");
    assert_eq!(missed[0].correct_answer, "word0");

    let correct = answer(&engine);
    engine.submit(&correct).unwrap();
    assert_eq!(engine.scheduler().record("v0").unwrap().correct_count, 1);
    assert!(engine.mistakes().all().is_empty());
  }

  #[tokio::test]
  async fn test_three_misses_end_the_run_and_queue_summary() {
    let (mut engine, submitter) = engine();
    engine.start(meta(), items(3), Some(3), Some(10)).unwrap();

    for _ in 0..3 {
      engine.submit("wrong").unwrap();
      engine.advance();
    }
    assert_eq!(engine.session().status(), SessionStatus::GameOver);
    assert!(matches!(engine.submit("wrong"), Err(SessionError::NotActive(_))));

    let pending = engine.queue().pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].hearts_remaining, 0);
    assert_eq!(pending[0].streak_delta, 0);
    assert_eq!(engine.mistakes().all().len(), 3);

    // Exiting afterwards does not queue the same run twice
    assert!(engine.exit().is_none());
    assert_eq!(engine.queue().flush().await, FlushOutcome::Delivered(1));
    assert_eq!(submitter.calls(), 1);
  }

  #[tokio::test]
  async fn test_completed_run_queues_xp() {
    let (mut engine, _) = engine();
    engine.start(meta(), items(2), Some(3), Some(2)).unwrap();
    for _ in 0..2 {
      let correct = answer(&engine);
      engine.submit(&correct).unwrap();
      engine.advance();
    }

    assert_eq!(engine.session().status(), SessionStatus::Completed);
    let pending = engine.queue().pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].accuracy, 100);
    assert_eq!(pending[0].xp_earned, 40);
    assert_eq!(pending[0].streak_delta, 1);
  }

  #[tokio::test]
  async fn test_exit_queues_only_after_an_attempt() {
    let (mut engine, _) = engine();
    engine.start(meta(), items(2), None, None).unwrap();
    assert!(engine.exit().is_none());
    assert!(engine.queue().is_empty());

    engine.start(meta(), items(2), None, None).unwrap();
    let correct = answer(&engine);
    engine.submit(&correct).unwrap();
    let event = engine.exit().unwrap();
    assert_eq!(event.total_attempts, 1);
    assert_eq!(engine.queue().len(), 1);
  }

  #[tokio::test]
  async fn test_exit_ends_the_session() {
    let (mut engine, _) = engine();
    engine.start(meta(), items(2), Some(2), Some(5)).unwrap();
    assert!(engine.exit().is_none());
    assert_eq!(engine.session().status(), SessionStatus::Idle);

    // Answers after exit are rejected and leave no trace
    assert_eq!(
      engine.submit("wrong"),
      Err(SessionError::NotActive(SessionStatus::Idle))
    );
    assert!(engine.scheduler().record("v0").is_none());
    assert!(engine.mistakes().all().is_empty());
    assert!(engine.queue().is_empty());
    assert!(session::load_snapshot(&engine.pool).unwrap().is_none());

    engine.retry();
    assert_eq!(engine.session().status(), SessionStatus::Idle);
    assert!(engine.exit().is_none());
    assert!(engine.queue().is_empty());
  }

  #[tokio::test]
  async fn test_exit_after_answers_queues_once_then_ends() {
    let (mut engine, _) = engine();
    engine.start(meta(), items(2), Some(3), Some(5)).unwrap();
    engine.submit("wrong").unwrap();
    assert!(engine.exit().is_some());
    assert_eq!(engine.session().status(), SessionStatus::Idle);
    assert!(engine.submit("word0").is_err());

    assert!(engine.exit().is_none());
    assert_eq!(engine.queue().len(), 1);
    assert_eq!(engine.scheduler().record("v0").unwrap().incorrect_count, 1);
  }

  #[tokio::test]
  async fn test_continue_session_queues_next_run_separately() {
    let (mut engine, _) = engine();
    engine.start(meta(), items(3), Some(3), Some(1)).unwrap();
    let correct = answer(&engine);
    engine.submit(&correct).unwrap();
    assert_eq!(engine.queue().len(), 1);

    engine.continue_session().unwrap();
    let correct = answer(&engine);
    engine.submit(&correct).unwrap();
    assert_eq!(engine.queue().len(), 2);
  }

  #[tokio::test]
  async fn test_resume_from_snapshot() {
    let config = test_config();
    let pool = db::init_memory_db().unwrap();
    let queue = CompletionQueue::new(pool.clone(), MockSubmitter::succeeding(), &config);
    let deck = items(3);

    let mut first = PracticeEngine::new(pool.clone(), queue.clone(), &config);
    first.start(meta(), deck.clone(), Some(3), Some(10)).unwrap();
    first.submit("wrong").unwrap();
    first.advance();

    let mut second = PracticeEngine::new(pool.clone(), queue.clone(), &config);
    assert!(second.resume(meta(), &deck));
    assert_eq!(second.session().current_index(), 1);
    assert_eq!(second.session().hearts(), 2);
    assert_eq!(second.session().total_attempts(), 1);

    // Nothing to resume once the session was exited
    second.exit();
    let mut third = PracticeEngine::new(pool, queue, &config);
    assert!(!third.resume(meta(), &deck));
  }

  #[tokio::test]
  async fn test_build_deck_prefers_mistakes() {
    let (mut engine, _) = engine();
    let candidates = items(4);
    engine.start(meta(), vec![candidates[2].clone()], Some(3), Some(10)).unwrap();
    engine.submit("wrong").unwrap();

    let deck = engine.build_deck(&candidates, DeckOptions::default());
    assert_eq!(deck[0].id, "v2");
    assert_eq!(engine.remedial_deck(&candidates, 10).len(), 1);
  }
}
