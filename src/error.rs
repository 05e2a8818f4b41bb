//! Error handling for Mailroom.
//!
//! This module provides:
//! - Structured error codes for machine-readable handling
//! - User-facing messages vs detailed internal messages
//! - A retryability classification driving the consumer loop
//! - Metrics integration for error tracking

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// A specialized Result type for Mailroom operations.
pub type Result<T> = std::result::Result<T, MailroomError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The queue store cannot be reached; no side effect may be assumed.
    StoreUnavailable,
    /// A queue entry could not be deserialized into a job record.
    MalformedPayload,
    /// A job record could not be serialized for the wire.
    SerializationFailed,
    /// Invalid or missing configuration at startup.
    Configuration,
    /// Anything that does not fit the categories above.
    Internal,
}

impl ErrorCode {
    /// Check if the operation that produced this error is worth retrying.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }

    /// Get the error category for metrics grouping.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::StoreUnavailable => "store",
            Self::MalformedPayload | Self::SerializationFailed => "serialization",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for Mailroom.
///
/// Carries a stable code, a message safe to surface, and an optional
/// internal detail intended for logs only.
#[derive(Error, Debug)]
pub struct MailroomError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose)
    message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal: Option<String>,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for MailroomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref internal) = self.internal {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl MailroomError {
    /// Create a new error with code and message.
    pub fn new(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            message: message.into(),
            internal: None,
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both public and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        message: impl Into<Cow<'static, str>>,
        internal: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, message);
        error.internal = Some(internal.into());
        error
    }

    /// Create a store-unavailable error from a driver failure.
    pub fn store_unavailable(internal: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::StoreUnavailable,
            "Queue store is unreachable",
            internal,
        )
    }

    /// Create a malformed-payload error.
    pub fn malformed_payload(internal: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::MalformedPayload,
            "Queue entry is not a valid job record",
            internal,
        )
    }

    /// Create a configuration error (fatal at startup).
    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(internal: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::Internal, "An internal error occurred", internal)
    }

    /// Attach a source error.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the internal detail, if any.
    pub fn internal_message(&self) -> Option<&str> {
        self.internal.as_deref()
    }

    /// Check if the failed operation is worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    fn record_metrics(&self) {
        counter!(
            "mailroom_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
        )
        .increment(1);
    }
}

impl From<serde_json::Error> for MailroomError {
    fn from(error: serde_json::Error) -> Self {
        Self::with_internal(
            ErrorCode::SerializationFailed,
            "Failed to serialize job record",
            error.to_string(),
        )
        .with_source(error)
    }
}
