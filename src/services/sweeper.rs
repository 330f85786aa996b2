//! Background expiry sweep.
//!
//! Deadlines are enforced by this periodic sweep over persisted
//! `expired_at` values, never by per-transaction timers, so a process
//! restart loses no pending expirations.

use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use crate::services::lifecycle::TransactionLifecycle;

/// Runs the sweep loop until the process exits. A failing pass is logged
/// and retried on the next tick; the sweep itself is idempotent.
pub async fn run_sweeper(lifecycle: TransactionLifecycle, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "expiry sweeper started");

    loop {
        match lifecycle.sweep_expired().await {
            Ok(swept) if swept.is_empty() => debug!("sweep pass: nothing to expire"),
            Ok(swept) => info!(count = swept.len(), "sweep pass expired transactions"),
            Err(e) => error!("sweep pass failed: {}", e),
        }

        sleep(interval).await;
    }
}
