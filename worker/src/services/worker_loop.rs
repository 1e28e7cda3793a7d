use crate::usecases::booking_sweeps::{BookingSweepUseCase, SweepReport};
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tokio::sync::{RwLock, watch};
use tracing::info;

/// Outcome of the most recent sweep, read by the health endpoint.
pub type LastSweep = Arc<RwLock<Option<(DateTime<Utc>, SweepReport)>>>;

/// Runs the sweep every `interval` until `shutdown` flips to true.
pub async fn run_sweep_loop(
    usecase: Arc<BookingSweepUseCase>,
    interval: Duration,
    last_sweep: LastSweep,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!(interval_secs = interval.as_secs(), "worker_loop: starting booking sweeps");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                let report = usecase.run(now).await;
                *last_sweep.write().await = Some((now, report));
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("worker_loop: shutdown requested, stopping sweeps");
                    return Ok(());
                }
            }
        }
    }
}
