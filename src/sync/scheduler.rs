use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::queue::CompletionQueue;

/// Messages to control the flush scheduler
#[derive(Debug)]
pub enum FlushSchedulerMessage {
    /// App came back to the foreground
    Foreground,
    Shutdown,
}

/// Handle for the periodic flush scheduler
pub struct FlushScheduler {
    sender: mpsc::Sender<FlushSchedulerMessage>,
    handle: JoinHandle<()>,
}

impl FlushScheduler {
    /// Flush right away if anything is pending
    pub fn app_foregrounded(&self) {
        self.send(FlushSchedulerMessage::Foreground);
    }

    pub fn shutdown(&self) {
        self.send(FlushSchedulerMessage::Shutdown);
    }

    fn send(&self, msg: FlushSchedulerMessage) {
        if let Err(e) = self.sender.try_send(msg) {
            tracing::debug!("Flush scheduler message dropped: {}", e);
        }
    }

    /// Wait for the loop to exit after `shutdown`
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::warn!("Flush scheduler task ended abnormally: {}", e);
        }
    }
}

/// Start the periodic flush loop.
///
/// Every `interval`, and whenever the app returns to the foreground, the
/// queue is flushed if it has hydrated and holds events. Flushes run as
/// separate tasks so an in-flight request never delays the next trigger;
/// overlapping ones collapse inside the queue.
pub fn start_flush_scheduler(queue: Arc<CompletionQueue>, interval: Duration) -> FlushScheduler {
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(flush_scheduler_loop(queue, interval, rx));
    FlushScheduler { sender: tx, handle }
}

async fn flush_scheduler_loop(
    queue: Arc<CompletionQueue>,
    interval: Duration,
    mut receiver: mpsc::Receiver<FlushSchedulerMessage>,
) {
    tracing::info!("Flush scheduler started, every {:.0}s", interval.as_secs_f64());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if queue.is_hydrated() && !queue.is_empty() {
                    queue.spawn_flush("periodic timer");
                }
            }

            msg = receiver.recv() => {
                match msg {
                    Some(FlushSchedulerMessage::Foreground) => {
                        if queue.is_hydrated() && !queue.is_empty() {
                            queue.spawn_flush("app foregrounded");
                        }
                    }
                    Some(FlushSchedulerMessage::Shutdown) | None => {
                        tracing::info!("Flush scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }
}
