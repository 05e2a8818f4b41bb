//! Mailroom daemon - main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use mailroom::{
    config::{Config, QueueConfig},
    delivery::ResendClient,
    health::{self, AppState},
    queue::{
        EmailQueueConsumer, QueueNames, QueueStatsReader, QueueStore, RecoverySweeper,
        RedisQueueStore,
    },
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config: {}. Using defaults.", e);
        Config::default()
    });

    // Initialize observability
    telemetry::init(
        &config.observability.log_level,
        config.observability.json_logging,
    )?;
    let metrics_handle = telemetry::install_metrics_recorder()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Mailroom"
    );

    // Create Redis client
    let redis_client = redis::Client::open(config.redis.url.as_str())
        .map_err(|e| anyhow::anyhow!("Failed to create Redis client: {}", e))?;
    tracing::info!("Redis client created for {}", config.redis.url);

    let store: Arc<dyn QueueStore> = Arc::new(RedisQueueStore::new(redis_client));
    let names = QueueNames::new(&config.queue.key_prefix);
    let stats = Arc::new(QueueStatsReader::new(store.clone(), names));

    let shutdown = CancellationToken::new();
    let mut background_tasks = Vec::new();

    if config.queue.enabled {
        // Missing credentials are fatal at startup, never per-job.
        let delivery = Arc::new(ResendClient::new(&config.resend)?);
        log_queue_policy(&config.queue);

        let consumer =
            EmailQueueConsumer::new(store.clone(), delivery, config.queue.clone());
        let consumer_shutdown = shutdown.clone();
        background_tasks.push(tokio::spawn(async move {
            consumer.run(consumer_shutdown).await;
        }));

        let sweeper = RecoverySweeper::new(store.clone(), &config.queue);
        let sweeper_shutdown = shutdown.clone();
        background_tasks.push(tokio::spawn(async move {
            sweeper.run(sweeper_shutdown).await;
        }));
    } else {
        tracing::warn!("Email queue consumer is DISABLED");
    }

    // Build router
    let app = health::build_router(AppState {
        stats,
        metrics: Some(metrics_handle),
    });

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let the in-progress attempt resolve; stranded jobs are swept later.
    shutdown.cancel();
    for task in background_tasks {
        let _ = task.await;
    }
    tracing::info!("Mailroom shutdown complete");

    Ok(())
}

/// Log the effective queue policy at startup.
fn log_queue_policy(queue: &QueueConfig) {
    let millis_per_email = (1000.0 / queue.emails_per_second).round() as u64;
    tracing::info!(
        rate_per_sec = queue.emails_per_second,
        interval_ms = millis_per_email,
        max_attempts = queue.max_attempts,
        retry_base_delay_ms = queue.retry_base_delay_ms,
        poll_timeout_secs = queue.poll_timeout_secs,
        sweep_interval_ms = queue.sweep_interval_ms,
        "Email queue consumer configuration"
    );
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
