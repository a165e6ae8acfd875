use serde::{Deserialize, Serialize};

/// Kind of practice material supplied by the content provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  Vocabulary,
  Grammar,
}

/// Which side of the text pair is shown and which one is expected back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
  TermToMeaning, // Target-language term shown, native meaning expected
  MeaningToTerm, // Native meaning shown, target-language term expected
}

/// One practice item as handed over by the content provider.
///
/// The engine never mutates items; it only orders and gates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeItem {
  pub id: String,
  /// Target-language text (e.g. 사과)
  pub term: String,
  /// Native-language text (e.g. "apple")
  pub meaning: String,
  pub category: Category,
  pub direction: Direction,
}

impl PracticeItem {
  pub fn new(
    id: impl Into<String>,
    term: impl Into<String>,
    meaning: impl Into<String>,
    category: Category,
    direction: Direction,
  ) -> Self {
    Self {
      id: id.into(),
      term: term.into(),
      meaning: meaning.into(),
      category,
      direction,
    }
  }

  /// Text the learner is expected to produce
  pub fn expected_answer(&self) -> &str {
    match self.direction {
      Direction::TermToMeaning => &self.meaning,
      Direction::MeaningToTerm => &self.term,
    }
  }
}
