//! Delivery of finished-session summaries to the remote aggregator.

pub mod client;
pub mod queue;
pub mod scheduler;

pub use client::{CompletionSubmitter, HttpSubmitter, StaticToken, TokenSource};
pub use queue::{CompletionQueue, FlushOutcome, FlushState, QueueStatus};
pub use scheduler::{start_flush_scheduler, FlushScheduler, FlushSchedulerMessage};
