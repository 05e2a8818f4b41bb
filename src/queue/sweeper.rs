//! Recovery of jobs stranded in the in-flight queue.
//!
//! A job sits in `in-flight` only between claim and resolution; if the
//! consumer dies in that window the entry stays behind. The sweep runs on
//! a fixed period and returns such entries to `pending` with their attempt
//! number unchanged (recovery does not count as an attempt).
//!
//! The sweep is best-effort reconciliation: it snapshots the in-flight
//! count and does not re-check mid-sweep, so a job legitimately claimed by
//! an active consumer moments earlier can be recovered into a duplicate
//! claim. Delivery is therefore at-least-once, never exactly-once.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::store::QueueStore;
use super::QueueNames;
use crate::config::QueueConfig;
use crate::error::Result;

/// Periodic task returning stranded in-flight jobs to pending.
pub struct RecoverySweeper {
    store: Arc<dyn QueueStore>,
    names: QueueNames,
    interval: Duration,
}

impl RecoverySweeper {
    pub fn new(store: Arc<dyn QueueStore>, config: &QueueConfig) -> Self {
        Self {
            store,
            names: QueueNames::new(&config.key_prefix),
            interval: Duration::from_millis(config.sweep_interval_ms),
        }
    }

    /// Run until the shutdown token is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "recovery sweep started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; wait a full period instead.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "recovery sweep failed");
                    }
                }
            }
        }

        info!("recovery sweep stopped");
    }

    /// Move up to a snapshot count of in-flight entries back to pending.
    pub async fn sweep_once(&self) -> Result<usize> {
        let stranded = self.store.len(&self.names.in_flight).await?;
        if stranded == 0 {
            return Ok(0);
        }

        warn!(stranded, "found stranded jobs in in-flight queue, recovering");

        let mut recovered = 0;
        for _ in 0..stranded {
            match self
                .store
                .move_one(&self.names.in_flight, &self.names.pending)
                .await?
            {
                Some(_) => recovered += 1,
                None => break,
            }
        }

        counter!("mailroom_jobs_recovered_total").increment(recovered as u64);
        info!(recovered, "recovered stranded jobs");
        Ok(recovered)
    }
}
