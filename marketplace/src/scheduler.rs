use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::Auction;
use crate::settlement::{self, SettleError};
use crate::Config;

/// Periodic clearing driver. One value owned by the application; started
/// and stopped through [`Scheduler::start`] and [`SchedulerHandle::stop`].
pub struct Scheduler {
    pool: PgPool,
    config: Arc<Config>,
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// What one tick did, for logs and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub closed: usize,
    pub cleared: usize,
    pub throttled: usize,
    pub failed: usize,
}

impl Scheduler {
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        Self { pool, config }
    }

    pub fn start(self) -> SchedulerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            tracing::info!(
                "clearing scheduler started, interval {:?}",
                self.config.clearing_interval
            );
            let mut ticker = tokio::time::interval(self.config.clearing_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match run_tick(&self.pool, &self.config, Utc::now()).await {
                            Ok(report) => tracing::debug!(
                                "tick done: {} closed, {} cleared, {} throttled, {} failed",
                                report.closed, report.cleared, report.throttled, report.failed
                            ),
                            Err(e) => tracing::error!("scheduler tick failed: {}", e),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("clearing scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }
}

/// One scheduler pass at wall time `now`: close expired windows, then run
/// a clearing round for every due auction. A single auction's failure is
/// logged and never halts the tick.
pub async fn run_tick(
    pool: &PgPool,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<TickReport, sqlx::Error> {
    let mut report = TickReport::default();

    for auction in Auction::expired_windows(pool, now).await? {
        match settlement::close_auction(pool, auction.id, now, "closed").await {
            Ok(_) => report.closed += 1,
            Err(e) => {
                report.failed += 1;
                tracing::error!("failed to close expired auction {}: {}", auction.id, e);
            }
        }
    }

    let interval = config.clearing_interval_chrono();
    for auction in Auction::due_for_clearing(pool, now).await? {
        // The window sweep above may have closed it already this tick.
        if let Some(last) = auction.last_clearing_at {
            let min_next = last + interval;
            if now < min_next {
                Auction::bump_next_clearing(pool, auction.id, min_next).await?;
                report.throttled += 1;
                tracing::debug!("auction {} throttled until {}", auction.id, min_next);
                continue;
            }
        }

        match settlement::clear_and_settle(pool, config, auction.id, now, false).await {
            Ok(_) => report.cleared += 1,
            Err(SettleError::Throttled { retry_at }) => {
                Auction::bump_next_clearing(pool, auction.id, retry_at).await?;
                report.throttled += 1;
            }
            Err(SettleError::NotCollecting) => {}
            Err(e) => {
                report.failed += 1;
                tracing::error!("clearing failed for auction {}: {}", auction.id, e);
            }
        }
    }

    Ok(report)
}
