//! The consumer loop: claim, attempt, resolve.
//!
//! A single sequential worker handles one job's full lifecycle before
//! claiming the next. Per job, the loop acquires a rate-limit token,
//! atomically moves the oldest pending entry into `in-flight`, invokes the
//! delivery client, and routes the outcome:
//!
//! - success: the claimed entry is removed from `in-flight`;
//! - retryable failure: attempt number incremented, exponential backoff,
//!   re-appended to the tail of `pending` and to `retry-log`;
//! - attempt budget exhausted: moved to `dead-letter` for manual
//!   intervention.
//!
//! Removals always use the exact bytes originally claimed, never a
//! re-serialization; the store removes by value identity of the stored
//! entry. No per-job error ever terminates the loop.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job::EmailJob;
use super::limiter::RateLimiter;
use super::store::QueueStore;
use super::QueueNames;
use crate::config::QueueConfig;
use crate::delivery::{DeliveryClient, DeliveryError, DeliveryFailureKind};
use crate::error::Result;

/// Fixed pause after a loop-level failure before the next claim.
const CLAIM_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Long-lived, single-worker queue consumer.
pub struct EmailQueueConsumer {
    store: Arc<dyn QueueStore>,
    delivery: Arc<dyn DeliveryClient>,
    limiter: RateLimiter,
    config: QueueConfig,
    names: QueueNames,
}

impl EmailQueueConsumer {
    pub fn new(
        store: Arc<dyn QueueStore>,
        delivery: Arc<dyn DeliveryClient>,
        config: QueueConfig,
    ) -> Self {
        let limiter = RateLimiter::new(config.emails_per_second);
        let names = QueueNames::new(&config.key_prefix);
        Self {
            store,
            delivery,
            limiter,
            config,
            names,
        }
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// The token is checked once per claim cycle, so an in-progress attempt
    /// always resolves; a job left in `in-flight` by a hard kill is picked
    /// up later by the recovery sweep.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            rate_per_sec = self.config.emails_per_second,
            max_attempts = self.config.max_attempts,
            poll_timeout_secs = self.config.poll_timeout_secs,
            "email queue consumer started"
        );

        while !shutdown.is_cancelled() {
            if let Err(e) = self.process_next().await {
                error!(error = %e, "error in consumer loop");
                tokio::time::sleep(CLAIM_ERROR_BACKOFF).await;
            }
        }

        info!("email queue consumer stopped");
    }

    /// Claim and fully resolve at most one job.
    async fn process_next(&self) -> Result<()> {
        self.limiter.acquire().await;

        let claimed = self
            .store
            .pop_and_claim(
                &self.names.pending,
                &self.names.in_flight,
                Duration::from_secs(self.config.poll_timeout_secs),
            )
            .await?;

        match claimed {
            Some(payload) => self.process_claimed(&payload).await,
            // Nothing pending; the loop polls again.
            None => Ok(()),
        }
    }

    async fn process_claimed(&self, payload: &str) -> Result<()> {
        let job: EmailJob = match serde_json::from_str(payload) {
            Ok(job) => job,
            Err(e) => {
                // An unparsable entry would fail identically on every
                // retry, so it is dropped with loud logging instead.
                error!(
                    error = %e,
                    payload_len = payload.len(),
                    "dropping malformed queue entry"
                );
                counter!("mailroom_jobs_malformed_total").increment(1);
                self.store.remove_one(&self.names.in_flight, payload).await?;
                return Ok(());
            }
        };

        debug!(
            job_id = %job.job_id,
            attempt = job.attempt_number,
            "processing email job"
        );

        match self.delivery.send(&job).await {
            Ok(()) => {
                self.store.remove_one(&self.names.in_flight, payload).await?;
                counter!("mailroom_emails_delivered_total").increment(1);
                info!(job_id = %job.job_id, "email sent");
                Ok(())
            }
            Err(failure) => self.handle_failure(job, payload, failure).await,
        }
    }

    async fn handle_failure(
        &self,
        mut job: EmailJob,
        payload: &str,
        failure: DeliveryError,
    ) -> Result<()> {
        if failure.kind == DeliveryFailureKind::AuthFailed {
            // Operator alert; still consumes a normal attempt.
            error!(
                job_id = %job.job_id,
                error = %failure,
                "delivery authentication failure"
            );
        } else {
            warn!(
                job_id = %job.job_id,
                attempt = job.attempt_number,
                error = %failure,
                "delivery failed"
            );
        }

        let failed_attempt = job.attempt_number;
        job.increment_attempt();

        if job.has_exceeded_max_attempts(self.config.max_attempts) {
            self.dead_letter(&job, payload).await
        } else {
            self.retry(&job, payload, failed_attempt).await
        }
    }

    /// Re-queue a failed job after exponential backoff.
    async fn retry(&self, job: &EmailJob, payload: &str, failed_attempt: u32) -> Result<()> {
        let delay = self.retry_delay(failed_attempt);
        info!(
            job_id = %job.job_id,
            attempt = job.attempt_number,
            max_attempts = self.config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "retrying email"
        );

        // Head-of-line delay: this consumer claims nothing while backing
        // off. Acceptable for a single-consumer deployment.
        tokio::time::sleep(delay).await;

        let updated = serde_json::to_string(job)?;
        self.store.push(&self.names.pending, &updated).await?;
        self.store.push(&self.names.retry_log, &updated).await?;
        self.store.remove_one(&self.names.in_flight, payload).await?;
        counter!("mailroom_emails_retried_total").increment(1);
        Ok(())
    }

    /// Backoff for the attempt that just failed: base * 2^(attempt - 1).
    fn retry_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        Duration::from_millis(
            self.config
                .retry_base_delay_ms
                .saturating_mul(1u64 << exponent),
        )
    }

    /// Park a job that exhausted its attempt budget.
    async fn dead_letter(&self, job: &EmailJob, payload: &str) -> Result<()> {
        error!(
            job_id = %job.job_id,
            max_attempts = self.config.max_attempts,
            "email exceeded max attempts, moving to dead letter queue"
        );

        // The original claimed payload is parked, not a re-serialization.
        self.store.push(&self.names.dead_letter, payload).await?;
        self.store.remove_one(&self.names.in_flight, payload).await?;
        counter!("mailroom_emails_dead_lettered_total").increment(1);
        Ok(())
    }
}
