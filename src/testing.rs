//! Test helpers: in-memory stores, fixture items and a scriptable submitter.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::config::EngineConfig;
use crate::domain::{Category, CompletionDraft, CompletionEvent, Direction, PracticeItem, StudyMode};
use crate::error::EngineError;
use crate::sync::CompletionSubmitter;

pub const TEST_ENDPOINT: &str = "http://aggregator.test/completions";

/// Config pointing at a fake endpoint with background flushing off, so tests
/// decide when a flush happens
pub fn test_config() -> EngineConfig {
    EngineConfig {
        auto_flush: false,
        ..EngineConfig::default().with_endpoint(TEST_ENDPOINT)
    }
}

/// `count` vocabulary items `v0..`, answered by `word{n}`
pub fn items(count: usize) -> Vec<PracticeItem> {
    (0..count)
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

pub fn draft(deck_id: &str) -> CompletionDraft {
    CompletionDraft {
        deck_id: deck_id.to_string(),
        category: Category::Vocabulary,
        mode: StudyMode::Typing,
        direction: Direction::TermToMeaning,
        correct_count: 8,
        total_attempts: 10,
        accuracy: 80.0,
        streak_delta: 1,
        xp_earned: 100.0,
        hearts_remaining: 1,
        completed_at: None,
    }
}

/// Records every batch; can be switched between failing and succeeding, and
/// optionally held open until a gate is notified
pub struct MockSubmitter {
    fail: AtomicBool,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<CompletionEvent>>>,
    gate: Option<Arc<Notify>>,
    entered: Notify,
    submitted: Notify,
}

impl MockSubmitter {
    fn build(fail: bool, gate: Option<Arc<Notify>>) -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(fail),
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
            gate,
            entered: Notify::new(),
            submitted: Notify::new(),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::build(false, None)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(true, None)
    }

    pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Self::build(false, Some(gate))
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<CompletionEvent>> {
        self.batches.lock().unwrap().clone()
    }

    /// Resolves once a submit call has started
    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    /// Resolves once a submit call has finished
    pub async fn wait_for_submit(&self) {
        self.submitted.notified().await;
    }
}

#[async_trait]
impl CompletionSubmitter for MockSubmitter {
    async fn submit(&self, _endpoint: &str, batch: &[CompletionEvent]) -> Result<(), EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        self.batches.lock().unwrap().push(batch.to_vec());
        let result = if self.fail.load(Ordering::SeqCst) {
            Err(EngineError::Network("mock aggregator offline".into()))
        } else {
            Ok(())
        };
        self.submitted.notify_one();
        result
    }
}
