//! Direction-aware answer matching.
//!
//! Meaning answers (native language) are matched leniently:
//! - case, punctuation and extra whitespace are ignored
//! - `a / b`, `a, b` and `a; b` list alternatives (any is correct)
//! - `(info)` is optional, e.g. `bank (money)` accepts `bank`
//! - one typo in a longer word is `CloseEnough`
//!
//! Term answers (target language, e.g. Hangul) must match exactly after
//! Unicode NFC normalization, ignoring whitespace and punctuation. Spacing
//! conventions are not what is being practiced.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::domain::{Direction, PracticeItem};

/// Minimum answer length (in chars) before a one-edit typo is tolerated
const TYPO_MIN_LEN: usize = 5;

/// Result of matching a learner's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchVerdict {
  Correct,
  /// Off by one edit; counts as correct
  CloseEnough,
  Incorrect,
}

impl MatchVerdict {
  pub fn is_correct(&self) -> bool {
    !matches!(self, Self::Incorrect)
  }
}

/// Evaluates an answer against a card; injected into the session
pub trait AnswerEvaluator: Send + Sync {
  fn evaluate(&self, item: &PracticeItem, answer: &str) -> MatchVerdict;
}

/// Default evaluator: picks lenient or strict matching from the card direction
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionalMatcher;

impl AnswerEvaluator for DirectionalMatcher {
  fn evaluate(&self, item: &PracticeItem, answer: &str) -> MatchVerdict {
    match item.direction {
      Direction::TermToMeaning => match_meaning(answer, &item.meaning),
      Direction::MeaningToTerm => match_term(answer, &item.term),
    }
  }
}

/// Lenient match for native-language answers
pub fn match_meaning(answer: &str, expected: &str) -> MatchVerdict {
  let input = normalize_meaning(answer);
  if input.is_empty() {
    return MatchVerdict::Incorrect;
  }

  let accepted = acceptable_meanings(expected);
  if accepted.iter().any(|a| *a == input) {
    return MatchVerdict::Correct;
  }

  let close = accepted
    .iter()
    .any(|a| a.chars().count() >= TYPO_MIN_LEN && levenshtein_distance(a, &input) <= 1);
  if close {
    MatchVerdict::CloseEnough
  } else {
    MatchVerdict::Incorrect
  }
}

/// Strict match for target-language answers
pub fn match_term(answer: &str, expected: &str) -> MatchVerdict {
  let input = normalize_term(answer);
  if !input.is_empty() && input == normalize_term(expected) {
    MatchVerdict::Correct
  } else {
    MatchVerdict::Incorrect
  }
}

/// Every normalized form of `expected` that counts as correct
fn acceptable_meanings(expected: &str) -> Vec<String> {
  let mut accepted: Vec<String> = Vec::new();
  let mut push = |candidate: String| {
    if !candidate.is_empty() && !accepted.contains(&candidate) {
      accepted.push(candidate);
    }
  };

  push(normalize_meaning(expected));
  push(normalize_meaning(&strip_parenthetical(expected)));

  for part in expected.split(['/', ',', ';']) {
    push(normalize_meaning(part));
    push(normalize_meaning(&strip_parenthetical(part)));
  }

  accepted
}

/// Remove `(...)` groups, e.g. "bank (money)" → "bank "
fn strip_parenthetical(input: &str) -> String {
  let mut depth = 0usize;
  input
    .chars()
    .filter(|&c| match c {
      '(' => {
        depth += 1;
        false
      }
      ')' => {
        depth = depth.saturating_sub(1);
        false
      }
      _ => depth == 0,
    })
    .collect()
}

fn normalize_meaning(input: &str) -> String {
  input
    .nfc()
    .flat_map(char::to_lowercase)
    .filter(|c| c.is_alphanumeric() || c.is_whitespace())
    .collect::<String>()
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
}

fn normalize_term(input: &str) -> String {
  input
    .nfc()
    .filter(|c| c.is_alphanumeric())
    .flat_map(char::to_lowercase)
    .collect()
}

/// Levenshtein distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
  let a_chars: Vec<char> = a.chars().collect();
  let b_chars: Vec<char> = b.chars().collect();

  if a_chars.is_empty() {
    return b_chars.len();
  }
  if b_chars.is_empty() {
    return a_chars.len();
  }

  let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
  let mut curr = vec![0usize; b_chars.len() + 1];

  for (i, ca) in a_chars.iter().enumerate() {
    curr[0] = i + 1;
    for (j, cb) in b_chars.iter().enumerate() {
      let cost = usize::from(ca != cb);
      curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
    }
    std::mem::swap(&mut prev, &mut curr);
  }

  prev[b_chars.len()]
}
