//! Deck assembly from candidate items.
//!
//! Remedial items (recent mistakes) go first, oldest mistake first; the rest
//! follow the scheduler's review order (due, new, not yet due).

use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};

use crate::domain::PracticeItem;
use crate::mistakes::MistakeTracker;
use crate::srs::SrsScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckOptions {
  pub limit: usize,
  pub remedial_first: bool,
  /// Shuffle presentation order after selection
  pub shuffle: bool,
}

impl Default for DeckOptions {
  fn default() -> Self {
    Self {
      limit: 20,
      remedial_first: true,
      shuffle: false,
    }
  }
}

/// Select up to `options.limit` of `candidates` in practice order
pub fn assemble_deck(
  candidates: &[PracticeItem],
  scheduler: &SrsScheduler,
  mistakes: &MistakeTracker,
  options: DeckOptions,
) -> Vec<PracticeItem> {
  let by_id: HashMap<&str, &PracticeItem> = candidates.iter().map(|item| (item.id.as_str(), item)).collect();
  let mut seen: HashSet<&str> = HashSet::new();
  let mut deck: Vec<PracticeItem> = Vec::with_capacity(options.limit.min(candidates.len()));

  if options.remedial_first {
    for mistake in mistakes.for_review(mistakes.limit()) {
      if deck.len() >= options.limit {
        break;
      }
      if let Some(item) = by_id.get(mistake.item_id.as_str()) {
        if seen.insert(item.id.as_str()) {
          deck.push((*item).clone());
        }
      }
    }
  }

  let ids: Vec<String> = candidates.iter().map(|item| item.id.clone()).collect();
  for id in scheduler.review_queue(&ids) {
    if deck.len() >= options.limit {
      break;
    }
    if let Some(item) = by_id.get(id.as_str()) {
      if seen.insert(item.id.as_str()) {
        deck.push((*item).clone());
      }
    }
  }

  if options.shuffle {
    deck.shuffle(&mut rand::rng());
  }

  tracing::debug!(
    candidates = candidates.len(),
    selected = deck.len(),
    "Assembled deck"
  );
  deck
}

/// Deck of mistaken items only, oldest mistake first
pub fn remedial_deck(candidates: &[PracticeItem], mistakes: &MistakeTracker, limit: usize) -> Vec<PracticeItem> {
  mistakes
    .for_review(mistakes.limit())
    .into_iter()
    .filter_map(|m| candidates.iter().find(|item| item.id == m.item_id).cloned())
    .take(limit)
    .collect()
}

/// Items per deck id, kept until explicitly invalidated
#[derive(Debug, Default)]
pub struct ContentCache {
  decks: HashMap<String, Vec<PracticeItem>>,
}

impl ContentCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Cached items for `deck_id`, loading them on a miss. Failed loads are not cached.
  pub fn get_or_load<E>(
    &mut self,
    deck_id: &str,
    load: impl FnOnce() -> Result<Vec<PracticeItem>, E>,
  ) -> Result<&[PracticeItem], E> {
    if !self.decks.contains_key(deck_id) {
      let items = load()?;
      tracing::debug!("Cached {} items for deck {}", items.len(), deck_id);
      self.decks.insert(deck_id.to_string(), items);
    }
    Ok(self.decks.get(deck_id).map(Vec::as_slice).unwrap_or_default())
  }

  pub fn get(&self, deck_id: &str) -> Option<&[PracticeItem]> {
    self.decks.get(deck_id).map(Vec::as_slice)
  }

  pub fn invalidate(&mut self, deck_id: &str) -> bool {
    self.decks.remove(deck_id).is_some()
  }

  pub fn invalidate_all(&mut self) {
    self.decks.clear();
  }
}
