//! The email job record and its wire format.
//!
//! Jobs travel between queues as JSON objects with camelCase field names.
//! The producer assigns `jobId` and `enqueuedAt`; only the consumer loop
//! mutates `attemptNumber`, and only upwards.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A single email delivery job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailJob {
    /// Recipient address
    pub to: String,

    /// Subject line
    pub subject: String,

    /// Rendered HTML body, opaque to the queue
    pub html: String,

    /// Sender address; the delivery client applies a default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Reply-to address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,

    /// Producer metadata, passed through unmodified
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    /// Correlation id assigned at enqueue time; never used for dedup
    pub job_id: String,

    /// Enqueue timestamp, epoch milliseconds
    pub enqueued_at: i64,

    /// Current attempt, starting at 1; monotonically non-decreasing
    #[serde(default = "default_attempt_number")]
    pub attempt_number: u32,
}

fn default_attempt_number() -> u32 {
    1
}

impl EmailJob {
    /// Create a new job with a fresh id, timestamped now, at attempt 1.
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            from: None,
            reply_to: None,
            metadata: HashMap::new(),
            job_id: Uuid::new_v4().to_string(),
            enqueued_at: Utc::now().timestamp_millis(),
            attempt_number: 1,
        }
    }

    /// Set the sender address.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Set the reply-to address.
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Record one more failed attempt. Saturates rather than wrapping, so
    /// a hostile `attemptNumber` on the wire cannot reset the count.
    pub fn increment_attempt(&mut self) {
        self.attempt_number = self.attempt_number.saturating_add(1);
    }

    /// Check whether the attempt budget is spent.
    pub fn has_exceeded_max_attempts(&self, max_attempts: u32) -> bool {
        self.attempt_number > max_attempts
    }
}
