use chrono::{DateTime, Duration, Utc};

use crate::config::{EASE_BONUS, EASE_PENALTY, MAX_EASE_FACTOR, MIN_EASE_FACTOR};

pub struct Sm2Result {
  pub ease_factor: f64,
  pub interval_days: i64,
  pub repetitions: i64,
  pub next_review: DateTime<Utc>,
}

/// Pass/fail SM-2 step.
///
/// Incorrect: interval resets to 0, ease drops by 0.2 (floor 1.3), repetitions reset.
/// Correct: interval 0 → 1 → 6 → round(interval * ease); ease grows by 0.05
/// (cap 2.8) only on that last, multiplicative step.
pub fn calculate_sm2(
  is_correct: bool,
  current_ease_factor: f64,
  current_interval: i64,
  current_repetitions: i64,
  now: DateTime<Utc>,
) -> Sm2Result {
  let ease = current_ease_factor.clamp(MIN_EASE_FACTOR, MAX_EASE_FACTOR);
  let interval = current_interval.max(0);

  let (new_interval, new_ease_factor, new_repetitions) = if !is_correct {
    (0, (ease - EASE_PENALTY).max(MIN_EASE_FACTOR), 0)
  } else {
    let (next, next_ease) = match interval {
      0 => (1, ease),
      1 => (6, ease),
      _ => (
        ((interval as f64) * ease).round() as i64,
        (ease + EASE_BONUS).min(MAX_EASE_FACTOR),
      ),
    };
    (next, next_ease, current_repetitions.max(0) + 1)
  };

  Sm2Result {
    ease_factor: new_ease_factor,
    interval_days: new_interval,
    repetitions: new_repetitions,
    next_review: now + Duration::days(new_interval),
  }
}
