//! # Mailroom
//!
//! A reliable, rate-limited email queue consumer.
//!
//! Mailroom dequeues jobs from a shared Redis-list-backed queue, sends them
//! to an external delivery API, and guarantees every job is either
//! delivered, retried with backoff, or permanently parked for operator
//! inspection. Nothing is silently lost.
//!
//! ## Architecture
//!
//! - **Consumer Loop**: single sequential worker; claim, attempt, resolve
//! - **Rate Limiter**: smoothed token gate below the provider's ceiling
//! - **Recovery Sweep**: returns stranded in-flight jobs to pending
//! - **Stats**: read-only queue depths for the health endpoint
//! - **Delivery**: Resend-compatible HTTP client behind a trait
//!
//! Delivery is at-least-once: the recovery sweep can re-queue a job an
//! active consumer still holds.

pub mod config;
pub mod delivery;
pub mod error;
pub mod health;
pub mod queue;
pub mod telemetry;

pub use error::{ErrorCode, MailroomError, Result};

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::config::{Config, QueueConfig};
    pub use crate::delivery::{DeliveryClient, DeliveryError, DeliveryFailureKind, ResendClient};
    pub use crate::error::{ErrorCode, MailroomError, Result};
    pub use crate::queue::{
        EmailJob, EmailQueueConsumer, InMemoryQueueStore, QueueNames, QueueStatsReader,
        QueueStatsSnapshot, QueueStore, RateLimiter, RecoverySweeper, RedisQueueStore,
    };
}
