// src/ingest/scheduler.rs
use std::sync::Arc;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::ingest::types::{AggregatePolicy, NewsPipeline};
use crate::notify::NotificationGate;

pub const DEFAULT_NOTIFY_INTERVAL_SECS: u64 = 15 * 60;

#[derive(Clone, Copy, Debug)]
pub struct NotifySchedulerCfg {
    pub interval_secs: u64,
}

impl Default for NotifySchedulerCfg {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_NOTIFY_INTERVAL_SECS,
        }
    }
}

/// Spawn the periodic digest job: every tick runs a fresh aggregation pass
/// under the notifying policy and hands the result to the gate. Failures
/// are logged and retried on the next tick; the notified-set stays intact
/// so nothing is silently marked as sent.
pub fn spawn_notify_scheduler(
    pipeline: Arc<dyn NewsPipeline>,
    gate: Arc<NotificationGate>,
    cfg: NotifySchedulerCfg,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(cfg.interval_secs));
        // The first tick completes immediately; consume it so the first
        // run happens one full interval after boot, matching the schedule.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();

            let articles = pipeline.aggregate(now, AggregatePolicy::notifying()).await;
            counter!("notify_runs_total").increment(1);

            match gate.notify(&articles).await {
                Ok(sent) => {
                    tracing::info!(
                        target: "notify",
                        aggregated = articles.len(),
                        sent = sent,
                        "notify tick"
                    );
                }
                Err(e) => {
                    counter!("notify_errors_total").increment(1);
                    tracing::warn!(target: "notify", error = %e, "notify tick failed");
                }
            }
        }
    })
}
