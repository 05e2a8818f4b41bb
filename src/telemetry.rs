//! Logging and metrics bootstrap.

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(log_level: &str, json_logging: bool) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    Ok(())
}

/// Install the Prometheus metrics recorder and describe our counters.
pub fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        "mailroom_emails_delivered_total",
        "Total emails accepted by the delivery provider"
    );
    describe_counter!(
        "mailroom_emails_retried_total",
        "Total delivery attempts re-queued with backoff"
    );
    describe_counter!(
        "mailroom_emails_dead_lettered_total",
        "Total jobs parked after exhausting the attempt budget"
    );
    describe_counter!(
        "mailroom_jobs_malformed_total",
        "Total unparsable queue entries dropped"
    );
    describe_counter!(
        "mailroom_jobs_recovered_total",
        "Total stranded jobs returned to pending by the recovery sweep"
    );
    describe_counter!("mailroom_errors_total", "Total errors by code");

    Ok(handle)
}
