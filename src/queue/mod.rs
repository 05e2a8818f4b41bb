//! Email queue processing.
//!
//! This module provides the failure-handling core of Mailroom:
//!
//! - **Job Record**: the unit of work and its wire format
//! - **Queue Store**: atomic primitives over four named, durable lists
//! - **Rate Limiter**: smoothed token gate below the provider ceiling
//! - **Consumer Loop**: claim, attempt, retry-with-backoff, dead-letter
//! - **Recovery Sweep**: returns stranded in-flight jobs to pending
//! - **Stats**: read-only queue depth projection for health reporting
//!
//! A job enters `pending` (enqueued by an external producer), is claimed
//! into `in-flight`, and is terminal once delivered or dead-lettered. Every
//! retry appends to `retry-log` and re-enters `pending` at the tail with an
//! incremented attempt number. Delivery is at-least-once: the sweep can
//! recover a job that an active consumer still holds.

pub mod consumer;
pub mod job;
pub mod limiter;
pub mod stats;
pub mod store;
pub mod sweeper;

pub use consumer::EmailQueueConsumer;
pub use job::EmailJob;
pub use limiter::RateLimiter;
pub use stats::{QueueStatsReader, QueueStatsSnapshot};
pub use store::{InMemoryQueueStore, QueueStore, RedisQueueStore};
pub use sweeper::RecoverySweeper;

/// Names of the four queue lists, derived from one configurable prefix.
#[derive(Debug, Clone)]
pub struct QueueNames {
    /// Jobs awaiting an attempt (new or retried)
    pub pending: String,
    /// Jobs claimed by the consumer but not yet resolved
    pub in_flight: String,
    /// Append-only record of every retried job (diagnostic only)
    pub retry_log: String,
    /// Jobs that exhausted the attempt budget
    pub dead_letter: String,
}

impl QueueNames {
    /// Derive the list names from a key prefix, e.g. `"mailroom:emails"`.
    pub fn new(prefix: &str) -> Self {
        Self {
            pending: format!("{prefix}:pending"),
            in_flight: format!("{prefix}:in-flight"),
            retry_log: format!("{prefix}:retry-log"),
            dead_letter: format!("{prefix}:dead-letter"),
        }
    }
}
