//! Scheduled cleanup of expired refresh token records.
//!
//! Expired rows are already invisible to the ledger's `exists` probe, so
//! this sweep is purely about reclaiming space.

use crate::db::Database;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run the cleanup once.
pub async fn run_cleanup(db: &Database) {
    match db.refresh_tokens().delete_expired().await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired refresh tokens", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up expired refresh tokens: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
