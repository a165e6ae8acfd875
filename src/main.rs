use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use practice_engine::config::EngineConfig;
use practice_engine::db;
use practice_engine::sync::{self, CompletionQueue, FlushOutcome, HttpSubmitter, StaticToken};

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "practice_engine=debug,practice_sync=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let watch = std::env::args().skip(1).any(|arg| arg == "--watch");
  let config = EngineConfig::load();

  let pool = match db::init_db(&config.database_path) {
    Ok(pool) => pool,
    Err(e) => {
      tracing::error!("Failed to open practice store: {}", e);
      std::process::exit(1);
    }
  };

  let submitter = match HttpSubmitter::new(Arc::new(StaticToken(config.sync_token.clone()))) {
    Ok(submitter) => submitter,
    Err(e) => {
      tracing::error!("Failed to build HTTP client: {}", e);
      std::process::exit(1);
    }
  };

  let queue = CompletionQueue::new(pool, Arc::new(submitter), &config);
  if let Err(e) = queue.hydrate() {
    tracing::warn!("Continuing with an empty queue: {}", e);
  }

  let status = queue.status();
  tracing::info!(
    pending = status.pending,
    last_synced_at = ?status.last_synced_at,
    updated_at = ?status.updated_at,
    "Completion queue loaded"
  );

  match queue.flush().await {
    FlushOutcome::Delivered(n) => tracing::info!("Synced {} completions", n),
    FlushOutcome::Empty => tracing::info!("Nothing to sync"),
    FlushOutcome::AlreadyInFlight | FlushOutcome::NotHydrated => {}
    FlushOutcome::Failed(e) => tracing::warn!("Sync failed, will retry later: {}", e),
  }

  if !watch {
    return;
  }

  let scheduler = sync::start_flush_scheduler(queue.clone(), Duration::from_secs(config.flush_interval_secs));
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!("Failed to listen for shutdown signal: {}", e);
  }
  scheduler.shutdown();
  scheduler.join().await;

  let status = queue.status();
  if status.pending > 0 {
    tracing::info!("{} completions still pending", status.pending);
  }
}
