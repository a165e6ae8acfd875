//! Hearts-gated practice session.
//!
//! `Idle → Active → {Completed | GameOver}`. `continue_session` re-enters
//! `Active` from `Completed`; `reset` reinitializes from any state and `end`
//! drops the deck and returns to `Idle`.
//!
//! The machine only evaluates and counts. Each submit returns an
//! `AnswerOutcome`; forwarding it to the scheduler and mistake tracker is the
//! caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{COMPLETION_BONUS_XP, XP_PER_CORRECT};
use crate::db::{self, DbPool};
use crate::domain::{Category, CompletionDraft, Direction, PracticeItem, StudyMode};
use crate::error::EngineError;
use crate::validation::{AnswerEvaluator, DirectionalMatcher, MatchVerdict};

const SNAPSHOT_KEY: &str = "session_snapshot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
  Idle,
  Active,
  Completed,
  GameOver,
}

impl SessionStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Completed | Self::GameOver)
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
  #[error("Cannot start a session with an empty deck")]
  EmptyDeck,
  #[error("Session target must be at least 1")]
  ZeroTarget,
  #[error("Session needs at least one heart")]
  NoHearts,
  #[error("Session is not active ({0:?})")]
  NotActive(SessionStatus),
  #[error("Only a completed session can continue ({0:?})")]
  NotCompleted(SessionStatus),
}

/// Result of one submit, forwarded by the caller to the scheduler and tracker
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
  pub item: PracticeItem,
  pub answer: String,
  pub verdict: MatchVerdict,
  pub hearts: u32,
  pub correct_count: u32,
  pub total_attempts: u32,
  pub status: SessionStatus,
  /// Set only on the submit that moved the session into a terminal state
  pub transition: Option<SessionStatus>,
}

impl AnswerOutcome {
  pub fn is_correct(&self) -> bool {
    self.verdict.is_correct()
  }
}

/// Labels carried into the completion summary
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMeta {
  pub deck_id: String,
  pub category: Category,
  pub mode: StudyMode,
  pub direction: Direction,
}

/// Resumable copy of the session counters; the deck is stored as item ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
  pub deck_ids: Vec<String>,
  pub current_index: usize,
  pub hearts: u32,
  pub max_hearts: u32,
  pub correct_count: u32,
  pub total_attempts: u32,
  pub target: u32,
  pub status: SessionStatus,
  pub saved_at: DateTime<Utc>,
}

pub struct SessionMachine {
  evaluator: Arc<dyn AnswerEvaluator>,
  deck: Vec<PracticeItem>,
  current_index: usize,
  hearts: u32,
  max_hearts: u32,
  correct_count: u32,
  total_attempts: u32,
  target: u32,
  status: SessionStatus,
}

impl Default for SessionMachine {
  fn default() -> Self {
    Self::new(Arc::new(DirectionalMatcher))
  }
}

impl SessionMachine {
  pub fn new(evaluator: Arc<dyn AnswerEvaluator>) -> Self {
    Self {
      evaluator,
      deck: Vec::new(),
      current_index: 0,
      hearts: 0,
      max_hearts: 0,
      correct_count: 0,
      total_attempts: 0,
      target: 1,
      status: SessionStatus::Idle,
    }
  }

  pub fn start(&mut self, deck: Vec<PracticeItem>, initial_hearts: u32, target: u32) -> Result<(), SessionError> {
    if deck.is_empty() {
      return Err(SessionError::EmptyDeck);
    }
    if target == 0 {
      return Err(SessionError::ZeroTarget);
    }
    if initial_hearts == 0 {
      return Err(SessionError::NoHearts);
    }

    self.deck = deck;
    self.max_hearts = initial_hearts;
    self.target = target;
    self.reinitialize(0);
    tracing::debug!(cards = self.deck.len(), hearts = initial_hearts, goal = target, "Session started");
    Ok(())
  }

  /// Evaluate `value` against the current card and update the counters
  pub fn submit_answer(&mut self, value: &str) -> Result<AnswerOutcome, SessionError> {
    if self.status != SessionStatus::Active {
      return Err(SessionError::NotActive(self.status));
    }
    let item = self.deck[self.current_index].clone();
    let verdict = self.evaluator.evaluate(&item, value);

    self.total_attempts += 1;
    let mut transition = None;
    if verdict.is_correct() {
      self.correct_count = (self.correct_count + 1).min(self.target);
      if self.correct_count == self.target {
        self.status = SessionStatus::Completed;
        transition = Some(SessionStatus::Completed);
      }
    } else {
      self.hearts = self.hearts.saturating_sub(1);
      if self.hearts == 0 {
        self.status = SessionStatus::GameOver;
        transition = Some(SessionStatus::GameOver);
      }
    }

    if let Some(terminal) = transition {
      tracing::debug!(?terminal, correct = self.correct_count, attempts = self.total_attempts, "Session ended");
    }

    Ok(AnswerOutcome {
      item,
      answer: value.to_string(),
      verdict,
      hearts: self.hearts,
      correct_count: self.correct_count,
      total_attempts: self.total_attempts,
      status: self.status,
      transition,
    })
  }

  /// Move to the next card, wrapping around; counters are untouched
  pub fn advance(&mut self) {
    if !self.deck.is_empty() {
      self.current_index = (self.current_index + 1) % self.deck.len();
    }
  }

  pub fn skip(&mut self) {
    self.advance();
  }

  /// Keep practicing after completion: counters reset, hearts restored, next card
  pub fn continue_session(&mut self) -> Result<(), SessionError> {
    if self.status != SessionStatus::Completed {
      return Err(SessionError::NotCompleted(self.status));
    }
    let next = (self.current_index + 1) % self.deck.len();
    self.reinitialize(next);
    Ok(())
  }

  /// Full reinitialization from any state; back to `Idle` when there is no deck
  pub fn reset(&mut self) {
    if self.deck.is_empty() {
      self.status = SessionStatus::Idle;
      self.current_index = 0;
      self.hearts = 0;
      self.correct_count = 0;
      self.total_attempts = 0;
    } else {
      self.reinitialize(0);
    }
  }

  /// Drop the deck and go back to `Idle`; submits are rejected until the next `start`
  pub fn end(&mut self) {
    self.deck.clear();
    self.reset();
  }

  fn reinitialize(&mut self, index: usize) {
    self.current_index = index;
    self.hearts = self.max_hearts;
    self.correct_count = 0;
    self.total_attempts = 0;
    self.status = SessionStatus::Active;
  }

  pub fn accuracy(&self) -> u32 {
    (100.0 * f64::from(self.correct_count) / f64::from(self.total_attempts.max(1))).round() as u32
  }

  pub fn progress(&self) -> u32 {
    let pct = (100.0 * f64::from(self.correct_count) / f64::from(self.target.max(1))).round() as u32;
    pct.min(100)
  }

  pub fn status(&self) -> SessionStatus {
    self.status
  }

  pub fn current_card(&self) -> Option<&PracticeItem> {
    self.deck.get(self.current_index)
  }

  pub fn current_index(&self) -> usize {
    self.current_index
  }

  pub fn deck(&self) -> &[PracticeItem] {
    &self.deck
  }

  pub fn hearts(&self) -> u32 {
    self.hearts
  }

  pub fn max_hearts(&self) -> u32 {
    self.max_hearts
  }

  pub fn correct_count(&self) -> u32 {
    self.correct_count
  }

  pub fn total_attempts(&self) -> u32 {
    self.total_attempts
  }

  pub fn target(&self) -> u32 {
    self.target
  }

  /// Summary for the completion queue; xp and streak only reward a completed run
  pub fn summary(&self, meta: &SessionMeta) -> CompletionDraft {
    let completed = self.status == SessionStatus::Completed;
    let bonus = if completed { COMPLETION_BONUS_XP } else { 0.0 };

    CompletionDraft {
      deck_id: meta.deck_id.clone(),
      category: meta.category,
      mode: meta.mode,
      direction: meta.direction,
      correct_count: self.correct_count,
      total_attempts: self.total_attempts,
      accuracy: f64::from(self.accuracy()),
      streak_delta: i32::from(completed),
      xp_earned: f64::from(self.correct_count) * XP_PER_CORRECT + bonus,
      hearts_remaining: self.hearts,
      completed_at: Some(Utc::now()),
    }
  }

  pub fn snapshot(&self) -> SessionSnapshot {
    SessionSnapshot {
      deck_ids: self.deck.iter().map(|item| item.id.clone()).collect(),
      current_index: self.current_index,
      hearts: self.hearts,
      max_hearts: self.max_hearts,
      correct_count: self.correct_count,
      total_attempts: self.total_attempts,
      target: self.target,
      status: self.status,
      saved_at: Utc::now(),
    }
  }

  /// Resume from a snapshot, resolving deck ids against `items`.
  /// Ids the content provider no longer supplies are dropped.
  pub fn restore(&mut self, snapshot: &SessionSnapshot, items: &[PracticeItem]) -> Result<(), SessionError> {
    let deck: Vec<PracticeItem> = snapshot
      .deck_ids
      .iter()
      .filter_map(|id| items.iter().find(|item| &item.id == id).cloned())
      .collect();
    if deck.is_empty() {
      return Err(SessionError::EmptyDeck);
    }

    self.current_index = snapshot.current_index.min(deck.len() - 1);
    self.deck = deck;
    self.max_hearts = snapshot.max_hearts.max(1);
    self.hearts = snapshot.hearts.min(self.max_hearts);
    self.target = snapshot.target.max(1);
    self.correct_count = snapshot.correct_count.min(self.target);
    self.total_attempts = snapshot.total_attempts.max(self.correct_count);
    self.status = snapshot.status;
    Ok(())
  }
}

pub fn save_snapshot(pool: &DbPool, snapshot: &SessionSnapshot) -> Result<(), EngineError> {
  let conn = db::try_lock(pool)?;
  Ok(db::set_json_setting(&conn, SNAPSHOT_KEY, snapshot)?)
}

pub fn load_snapshot(pool: &DbPool) -> Result<Option<SessionSnapshot>, EngineError> {
  let conn = db::try_lock(pool)?;
  Ok(db::get_json_setting(&conn, SNAPSHOT_KEY)?)
}

pub fn clear_snapshot(pool: &DbPool) -> Result<(), EngineError> {
  let conn = db::try_lock(pool)?;
  Ok(db::delete_setting(&conn, SNAPSHOT_KEY)?)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn deck(n: usize) -> Vec<PracticeItem> {
    (0..n)
      .map(|i| {
        PracticeItem::new(
          format!("v{}", i),
          format!("단어{}", i),
          format!("word{}", i),
          Category::Vocabulary,
          Direction::TermToMeaning,
        )
      })
      .collect()
  }

  fn started(cards: usize, hearts: u32, target: u32) -> SessionMachine {
    let mut session = SessionMachine::default();
    session.start(deck(cards), hearts, target).unwrap();
    session
  }

  fn answer_correctly(session: &mut SessionMachine) -> AnswerOutcome {
    let expected = session.current_card().unwrap().meaning.clone();
    session.submit_answer(&expected).unwrap()
  }

  #[test]
  fn test_start_validates_input() {
    let mut session = SessionMachine::default();
    assert_eq!(session.status(), SessionStatus::Idle);
    assert_eq!(session.start(Vec::new(), 3, 10), Err(SessionError::EmptyDeck));
    assert_eq!(session.start(deck(1), 3, 0), Err(SessionError::ZeroTarget));
    assert_eq!(session.start(deck(1), 0, 10), Err(SessionError::NoHearts));

    session.start(deck(2), 3, 10).unwrap();
    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.hearts(), 3);
    assert_eq!(session.correct_count(), 0);
  }

  #[test]
  fn test_three_misses_end_in_game_over() {
    let mut session = started(5, 3, 10);

    let first = session.submit_answer("wrong").unwrap();
    assert_eq!(first.hearts, 2);
    assert_eq!(first.transition, None);
    session.submit_answer("wrong").unwrap();
    let last = session.submit_answer("wrong").unwrap();

    assert_eq!(last.hearts, 0);
    assert_eq!(last.transition, Some(SessionStatus::GameOver));
    assert_eq!(session.status(), SessionStatus::GameOver);

    // Game over fires once; later submits are rejected and change nothing
    assert_eq!(
      session.submit_answer("wrong"),
      Err(SessionError::NotActive(SessionStatus::GameOver))
    );
    assert_eq!(session.hearts(), 0);
    assert_eq!(session.total_attempts(), 3);
  }

  #[test]
  fn test_reaching_target_completes_once() {
    let mut session = started(3, 3, 2);

    let first = answer_correctly(&mut session);
    assert_eq!(first.transition, None);
    assert_eq!(session.progress(), 50);
    let second = answer_correctly(&mut session);
    assert_eq!(second.transition, Some(SessionStatus::Completed));
    assert_eq!(session.correct_count(), 2);
    assert_eq!(session.progress(), 100);
    assert!(session.submit_answer("word0").is_err());
  }

  #[test]
  fn test_accuracy_rounds() {
    let mut session = started(1, 5, 10);
    for _ in 0..3 {
      answer_correctly(&mut session);
    }
    session.submit_answer("nope").unwrap();
    assert_eq!(session.correct_count(), 3);
    assert_eq!(session.total_attempts(), 4);
    assert_eq!(session.accuracy(), 75);
    assert_eq!(session.progress(), 30);
  }

  #[test]
  fn test_accuracy_with_no_attempts_is_zero() {
    let session = started(1, 3, 10);
    assert_eq!(session.accuracy(), 0);
    assert_eq!(session.progress(), 0);
  }

  #[test]
  fn test_advance_wraps_and_keeps_counters() {
    let mut session = started(3, 3, 10);
    session.submit_answer("nope").unwrap();
    session.advance();
    session.skip();
    assert_eq!(session.current_index(), 2);
    session.advance();
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.hearts(), 2);
    assert_eq!(session.total_attempts(), 1);
  }

  #[test]
  fn test_single_card_deck_skip_wraps_to_itself() {
    let mut session = started(1, 3, 10);
    session.skip();
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.current_card().unwrap().id, "v0");
  }

  #[test]
  fn test_continue_after_completion() {
    let mut session = started(3, 3, 1);
    session.submit_answer("nope").unwrap();
    answer_correctly(&mut session);
    assert_eq!(session.status(), SessionStatus::Completed);

    session.continue_session().unwrap();
    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.current_index(), 1);
    assert_eq!(session.hearts(), 3);
    assert_eq!(session.correct_count(), 0);
    assert_eq!(session.total_attempts(), 0);
  }

  #[test]
  fn test_continue_requires_completed() {
    let mut session = started(2, 1, 5);
    assert_eq!(
      session.continue_session(),
      Err(SessionError::NotCompleted(SessionStatus::Active))
    );
    session.submit_answer("nope").unwrap();
    assert_eq!(
      session.continue_session(),
      Err(SessionError::NotCompleted(SessionStatus::GameOver))
    );
  }

  #[test]
  fn test_reset_from_game_over() {
    let mut session = started(2, 1, 5);
    session.advance();
    session.submit_answer("nope").unwrap();
    session.reset();
    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.hearts(), 1);
    assert_eq!(session.total_attempts(), 0);

    let mut idle = SessionMachine::default();
    idle.reset();
    assert_eq!(idle.status(), SessionStatus::Idle);
  }

  #[test]
  fn test_end_returns_to_idle() {
    let mut session = started(3, 2, 5);
    answer_correctly(&mut session);
    session.end();

    assert_eq!(session.status(), SessionStatus::Idle);
    assert!(session.deck().is_empty());
    assert_eq!(session.current_card(), None);
    assert_eq!(session.total_attempts(), 0);
    assert_eq!(
      session.submit_answer("word0"),
      Err(SessionError::NotActive(SessionStatus::Idle))
    );

    // Reset after end stays idle instead of reviving the old deck
    session.reset();
    assert_eq!(session.status(), SessionStatus::Idle);
  }

  #[test]
  fn test_hearts_stay_in_bounds() {
    let mut session = started(4, 2, 50);
    for i in 0..40 {
      if session.status() != SessionStatus::Active {
        session.reset();
      }
      if i % 3 == 0 {
        answer_correctly(&mut session);
      } else {
        session.submit_answer("nope").unwrap();
      }
      assert!(session.hearts() <= session.max_hearts());
      session.advance();
    }
  }

  #[test]
  fn test_summary_rewards_completion() {
    let meta = SessionMeta {
      deck_id: "deck-7".to_string(),
      category: Category::Vocabulary,
      mode: StudyMode::Typing,
      direction: Direction::TermToMeaning,
    };

    let mut session = started(2, 3, 2);
    answer_correctly(&mut session);
    session.submit_answer("nope").unwrap();
    answer_correctly(&mut session);
    let draft = session.summary(&meta);
    assert_eq!(draft.deck_id, "deck-7");
    assert_eq!(draft.streak_delta, 1);
    assert_eq!(draft.xp_earned, 2.0 * XP_PER_CORRECT + COMPLETION_BONUS_XP);
    assert_eq!(draft.accuracy, 67.0);
    assert_eq!(draft.hearts_remaining, 2);

    let mut failed = started(2, 1, 2);
    failed.submit_answer("nope").unwrap();
    let draft = failed.summary(&meta);
    assert_eq!(draft.streak_delta, 0);
    assert_eq!(draft.xp_earned, 0.0);
  }

  #[test]
  fn test_snapshot_restore() {
    let items = deck(3);
    let mut session = SessionMachine::default();
    session.start(items.clone(), 3, 5).unwrap();
    session.submit_answer("nope").unwrap();
    session.advance();
    let snapshot = session.snapshot();

    let mut resumed = SessionMachine::default();
    resumed.restore(&snapshot, &items).unwrap();
    assert_eq!(resumed.current_index(), 1);
    assert_eq!(resumed.hearts(), 2);
    assert_eq!(resumed.total_attempts(), 1);
    assert_eq!(resumed.status(), SessionStatus::Active);

    assert_eq!(resumed.restore(&snapshot, &[]), Err(SessionError::EmptyDeck));
  }

  #[test]
  fn test_snapshot_persistence() {
    let pool = db::init_memory_db().unwrap();
    assert_eq!(load_snapshot(&pool).unwrap(), None);

    let session = started(2, 3, 5);
    let snapshot = session.snapshot();
    save_snapshot(&pool, &snapshot).unwrap();
    assert_eq!(load_snapshot(&pool).unwrap(), Some(snapshot));

    clear_snapshot(&pool).unwrap();
    assert_eq!(load_snapshot(&pool).unwrap(), None);
  }
}
