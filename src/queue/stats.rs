//! Read-only queue depth projection for health reporting.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::store::QueueStore;
use super::QueueNames;
use crate::error::Result;

/// Point-in-time queue depths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatsSnapshot {
    /// Jobs awaiting an attempt
    pub pending: usize,
    /// Jobs claimed but not yet resolved
    pub in_flight: usize,
    /// Retry-log length (total retries, append-only)
    pub retried: usize,
    /// Dead-letter length (requires manual intervention)
    pub dead_lettered: usize,
    /// pending + in_flight
    pub total: usize,
    /// True when the store was unreachable and all counts are zeroed
    pub degraded: bool,
}

/// Reads queue sizes without side effects.
pub struct QueueStatsReader {
    store: Arc<dyn QueueStore>,
    names: QueueNames,
}

impl QueueStatsReader {
    pub fn new(store: Arc<dyn QueueStore>, names: QueueNames) -> Self {
        Self { store, names }
    }

    /// Snapshot current queue depths.
    ///
    /// Store unavailability degrades to an all-zero snapshot rather than an
    /// error, so health checks stay answerable.
    pub async fn snapshot(&self) -> QueueStatsSnapshot {
        match self.read_all().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "queue stats degraded, store unreachable");
                QueueStatsSnapshot {
                    degraded: true,
                    ..Default::default()
                }
            }
        }
    }

    async fn read_all(&self) -> Result<QueueStatsSnapshot> {
        let pending = self.store.len(&self.names.pending).await?;
        let in_flight = self.store.len(&self.names.in_flight).await?;
        let retried = self.store.len(&self.names.retry_log).await?;
        let dead_lettered = self.store.len(&self.names.dead_letter).await?;

        Ok(QueueStatsSnapshot {
            pending,
            in_flight,
            retried,
            dead_lettered,
            total: pending + in_flight,
            degraded: false,
        })
    }
}
