use std::str::FromStr;
use std::sync::Arc;

use cron::Schedule;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::orchestrator::RefreshOrchestrator;

/// Refresh cadences as 6-field cron expressions (seconds first).
pub const COIN_LIST_SCHEDULE: &str = "0 0 * * * *";
pub const DEX_METRICS_SCHEDULE: &str = "0 */5 * * * *";
pub const MARKET_METRICS_SCHEDULE: &str = "0 */10 * * * *";
pub const SNAPSHOT_REWARM_SCHEDULE: &str = "0 0 */12 * * *";

/// Spawns one cron loop per refresh cadence. Each cadence owns a run
/// lock; a tick that fires while the previous run of the same cadence
/// is still going is skipped, not queued.
pub struct RefreshScheduler {
    orchestrator: Arc<RefreshOrchestrator>,
}

impl RefreshScheduler {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Seed the snapshot and spawn all cadence loops. The coin list runs
    /// once immediately so a fresh deployment has a universe to serve
    /// before the first hourly tick.
    pub async fn start(&self) {
        let orchestrator = Arc::clone(&self.orchestrator);
        if let Err(e) = orchestrator.warm_snapshot().await {
            warn!(error = %e, "initial snapshot warm failed, starting empty");
        }
        if let Err(e) = orchestrator.refresh_coin_list().await {
            error!(error = %e, "initial coin list refresh failed");
        }
        if let Err(e) = orchestrator.refresh_launch_tokens().await {
            error!(error = %e, "initial launch token refresh failed");
        }
        if let Err(e) = orchestrator.refresh_currency_rates().await {
            error!(error = %e, "initial currency rate refresh failed");
        }

        self.spawn_cadence("coin_list", COIN_LIST_SCHEDULE, {
            let orchestrator = Arc::clone(&self.orchestrator);
            move || {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    orchestrator.refresh_coin_list().await?;
                    orchestrator.refresh_launch_tokens().await?;
                    Ok(())
                }
            }
        });

        self.spawn_cadence("dex_metrics", DEX_METRICS_SCHEDULE, {
            let orchestrator = Arc::clone(&self.orchestrator);
            move || {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    orchestrator.refresh_dex_metrics().await?;
                    Ok(())
                }
            }
        });

        self.spawn_cadence("market_metrics", MARKET_METRICS_SCHEDULE, {
            let orchestrator = Arc::clone(&self.orchestrator);
            move || {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    orchestrator.refresh_market_metrics().await?;
                    Ok(())
                }
            }
        });

        self.spawn_cadence("snapshot_rewarm", SNAPSHOT_REWARM_SCHEDULE, {
            let orchestrator = Arc::clone(&self.orchestrator);
            move || {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    orchestrator.warm_snapshot().await?;
                    orchestrator.refresh_currency_rates().await?;
                    Ok(())
                }
            }
        });
    }

    fn spawn_cadence<F, Fut>(&self, name: &'static str, expression: &'static str, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), crate::error::IngestError>> + Send + 'static,
    {
        let schedule = match Schedule::from_str(expression) {
            Ok(schedule) => schedule,
            Err(e) => {
                // expressions are compile-time constants, this is unreachable
                // short of a typo introduced in review
                error!(cadence = name, error = %e, "invalid cron expression, cadence disabled");
                return;
            }
        };
        let run_lock = Arc::new(Mutex::new(()));
        let job = Arc::new(job);

        tokio::spawn(async move {
            loop {
                let Some(next_run) = schedule.upcoming(chrono::Utc).next() else {
                    error!(cadence = name, "no upcoming cron tick, cadence stopped");
                    break;
                };
                let wait = (next_run - chrono::Utc::now())
                    .to_std()
                    .unwrap_or(Duration::from_secs(1));
                sleep(wait).await;

                // Run off the timing loop so a slow cycle cannot delay the
                // next tick; the lock makes that tick a skip instead of an
                // overlapping run.
                let run_lock = Arc::clone(&run_lock);
                let job = Arc::clone(&job);
                tokio::spawn(async move {
                    let Ok(_guard) = run_lock.try_lock() else {
                        warn!(cadence = name, "previous run still in progress, skipping tick");
                        return;
                    };
                    info!(cadence = name, "cycle starting");
                    if let Err(e) = job().await {
                        error!(cadence = name, error = %e, "cycle failed");
                    }
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_expressions_parse() {
        for expression in [
            COIN_LIST_SCHEDULE,
            DEX_METRICS_SCHEDULE,
            MARKET_METRICS_SCHEDULE,
            SNAPSHOT_REWARM_SCHEDULE,
        ] {
            assert!(Schedule::from_str(expression).is_ok(), "{expression}");
        }
    }

    #[test]
    fn dex_cadence_fires_every_five_minutes() {
        let schedule = Schedule::from_str(DEX_METRICS_SCHEDULE).unwrap();
        let mut ticks = schedule.upcoming(chrono::Utc);
        let first = ticks.next().unwrap();
        let second = ticks.next().unwrap();
        assert_eq!((second - first).num_minutes(), 5);
    }
}
