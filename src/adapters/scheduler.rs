//! Recurring sweep trigger.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::domain::settings::SweepSettings;
use crate::domain::sweeper::{ExpirationSweeper, SweepReport};

/// Runs the sweeper on every tick until `shutdown` flips to `true`.
/// Returns the number of sweeps that completed.
pub async fn run_sweep_schedule(
    sweeper: Arc<ExpirationSweeper>,
    settings: SweepSettings,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    let mut ticker = time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    if !settings.run_on_start {
        // The first tick of an interval completes immediately.
        ticker.reset();
    }

    tracing::info!(
        interval_secs = settings.interval.as_secs(),
        run_on_start = settings.run_on_start,
        "expiration schedule started"
    );

    let mut runs = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if run_once(Arc::clone(&sweeper)).await.is_some() {
                    runs += 1;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!(runs, "expiration schedule stopped");
    runs
}

async fn run_once(sweeper: Arc<ExpirationSweeper>) -> Option<SweepReport> {
    match tokio::task::spawn_blocking(move || sweeper.sweep()).await {
        Ok(Ok(report)) if report.skipped => None,
        Ok(Ok(report)) => Some(report),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "expiration sweep failed");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "expiration sweep task panicked");
            None
        }
    }
}
