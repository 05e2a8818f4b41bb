//! Delivery boundary: handing a job to the email provider.
//!
//! The consumer loop only sees success or a classified failure; every
//! failure kind routes through the same attempt budget. Authentication
//! failures are logged distinctly as an operator alert but are not given a
//! fast-fail path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::queue::EmailJob;

mod resend;
pub use resend::ResendClient;

/// Classification of a failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFailureKind {
    /// Provider-side throttling
    RateLimited,
    /// Provider rejected the payload
    InvalidPayload,
    /// Credentials rejected; operationally fatal, alerted distinctly
    AuthFailed,
    /// Transport failure or any other provider error
    ServerError,
}

/// A failed delivery attempt with its classification.
#[derive(Debug, Clone)]
pub struct DeliveryError {
    pub kind: DeliveryFailureKind,
    pub detail: String,
}

impl DeliveryError {
    pub fn new(kind: DeliveryFailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn rate_limited(detail: impl Into<String>) -> Self {
        Self::new(DeliveryFailureKind::RateLimited, detail)
    }

    pub fn invalid_payload(detail: impl Into<String>) -> Self {
        Self::new(DeliveryFailureKind::InvalidPayload, detail)
    }

    pub fn auth_failed(detail: impl Into<String>) -> Self {
        Self::new(DeliveryFailureKind::AuthFailed, detail)
    }

    pub fn server_error(detail: impl Into<String>) -> Self {
        Self::new(DeliveryFailureKind::ServerError, detail)
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for DeliveryError {}

/// Result type for a single delivery attempt.
pub type DeliveryResult = std::result::Result<(), DeliveryError>;

/// Attempts delivery of one job and reports a classified outcome.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn send(&self, job: &EmailJob) -> DeliveryResult;
}
