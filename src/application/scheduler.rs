use std::future::Future;
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::MAX_INTEREST_INTERVAL;

use super::{AppError, InterestRun};

/// Background task that runs interest accrual on a fixed period.
///
/// The first run happens one full interval after start. Runs are awaited
/// inline, so two runs never overlap, and [`InterestScheduler::shutdown`]
/// lets a run already in progress finish before the task exits.
#[derive(Debug)]
pub struct InterestScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl InterestScheduler {
    pub fn start<F, Fut>(interval: Duration, job: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<InterestRun, AppError>> + Send + 'static,
    {
        let interval = interval.clamp(Duration::from_millis(1), MAX_INTEREST_INTERVAL);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!("Interest scheduler started (every {:?})", interval);

            loop {
                tokio::select! {
                    biased;
                    // Also fires when the sender is dropped
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => match job().await {
                        Ok(run) => info!("Interest run credited {} account(s)", run.credited.len()),
                        Err(e) => error!("Interest run failed: {}", e),
                    },
                }
            }

            debug!("Interest scheduler stopped");
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stop scheduling new runs and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!("Interest scheduler task failed: {}", e);
        }
    }
}
