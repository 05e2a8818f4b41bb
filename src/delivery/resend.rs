//! Resend HTTP delivery client.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{DeliveryClient, DeliveryError, DeliveryResult};
use crate::config::ResendConfig;
use crate::error::{MailroomError, Result};
use crate::queue::EmailJob;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin wrapper translating a job into the provider payload.
#[derive(Debug)]
pub struct ResendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    default_from: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<Tag<'a>>,
}

#[derive(Serialize)]
struct Tag<'a> {
    name: &'a str,
    value: &'a str,
}

impl ResendClient {
    /// Create a client from configuration. Missing credentials are a
    /// startup error, not a per-job failure.
    pub fn new(config: &ResendConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                MailroomError::configuration("resend.api_key is required when the queue is enabled")
            })?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MailroomError::internal(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_from: config.default_from.clone(),
        })
    }

    fn build_request<'a>(&'a self, job: &'a EmailJob) -> SendEmailRequest<'a> {
        SendEmailRequest {
            from: job.from.as_deref().unwrap_or(&self.default_from),
            to: [&job.to],
            subject: &job.subject,
            html: &job.html,
            reply_to: job.reply_to.as_deref(),
            tags: job
                .metadata
                .iter()
                .map(|(name, value)| Tag { name, value })
                .collect(),
        }
    }
}

#[async_trait]
impl DeliveryClient for ResendClient {
    async fn send(&self, job: &EmailJob) -> DeliveryResult {
        let url = format!("{}/emails", self.base_url);
        let body = self.build_request(job);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::server_error(format!("request timed out: {e}"))
                } else {
                    DeliveryError::server_error(format!("transport error: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(job_id = %job.job_id, "provider accepted email");
            return Ok(());
        }

        let detail = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(512)
            .collect::<String>();
        let detail = format!("status {status}: {detail}");

        Err(match status.as_u16() {
            429 => DeliveryError::rate_limited(detail),
            400 | 422 => DeliveryError::invalid_payload(detail),
            401 | 403 => DeliveryError::auth_failed(detail),
            _ => DeliveryError::server_error(detail),
        })
    }
}
