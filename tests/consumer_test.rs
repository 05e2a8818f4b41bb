//! End-to-end consumer tests over the in-memory store.
//!
//! These run under tokio's paused clock, so rate-limit waits, poll
//! timeouts, and retry backoffs elapse instantly.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mailroom::config::QueueConfig;
use mailroom::delivery::{DeliveryClient, DeliveryError, DeliveryResult};
use mailroom::queue::{
    EmailJob, EmailQueueConsumer, InMemoryQueueStore, QueueNames, QueueStatsReader,
    QueueStore, RecoverySweeper,
};

/// Delivery client scripted with a sequence of outcomes; outcomes beyond
/// the script succeed.
struct ScriptedDelivery {
    outcomes: Mutex<VecDeque<DeliveryResult>>,
    sent: Mutex<Vec<EmailJob>>,
}

impl ScriptedDelivery {
    fn new(outcomes: Vec<DeliveryResult>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> Vec<EmailJob> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryClient for ScriptedDelivery {
    async fn send(&self, job: &EmailJob) -> DeliveryResult {
        self.sent.lock().unwrap().push(job.clone());
        self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

struct Harness {
    store: Arc<InMemoryQueueStore>,
    delivery: Arc<ScriptedDelivery>,
    names: QueueNames,
    shutdown: CancellationToken,
    consumer_task: tokio::task::JoinHandle<()>,
}

impl Harness {
    fn start(outcomes: Vec<DeliveryResult>) -> Self {
        let config = QueueConfig::default();
        let names = QueueNames::new(&config.key_prefix);
        let store = Arc::new(InMemoryQueueStore::new());
        let delivery = Arc::new(ScriptedDelivery::new(outcomes));
        let consumer = EmailQueueConsumer::new(store.clone(), delivery.clone(), config);

        let shutdown = CancellationToken::new();
        let consumer_shutdown = shutdown.clone();
        let consumer_task = tokio::spawn(async move {
            consumer.run(consumer_shutdown).await;
        });

        Self {
            store,
            delivery,
            names,
            shutdown,
            consumer_task,
        }
    }

    async fn enqueue(&self, job: &EmailJob) {
        let payload = serde_json::to_string(job).unwrap();
        self.store.push(&self.names.pending, &payload).await.unwrap();
    }

    /// Wait until `pending` and `in-flight` are both empty.
    async fn settle(&self) {
        for _ in 0..2_000 {
            let pending = self.store.len(&self.names.pending).await.unwrap();
            let in_flight = self.store.len(&self.names.in_flight).await.unwrap();
            if pending == 0 && in_flight == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("queues did not settle");
    }

    async fn stop(self) -> Arc<InMemoryQueueStore> {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(60), self.consumer_task)
            .await
            .expect("consumer loop did not stop")
            .unwrap();
        self.store
    }
}

#[tokio::test(start_paused = true)]
async fn delivers_a_pending_job_and_leaves_no_trace() {
    let harness = Harness::start(vec![Ok(())]);
    harness.enqueue(&EmailJob::new("user@example.com", "Welcome", "<p>Hi</p>")).await;

    harness.settle().await;

    assert_eq!(harness.delivery.attempts().len(), 1);
    let names = harness.names.clone();
    let store = harness.stop().await;
    assert_eq!(store.len(&names.retry_log).await.unwrap(), 0);
    assert_eq!(store.len(&names.dead_letter).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_retries_then_succeeds() {
    let harness = Harness::start(vec![
        Err(DeliveryError::rate_limited("throttled")),
        Ok(()),
    ]);
    let mut job = EmailJob::new("user@example.com", "Welcome", "<p>Hi</p>");
    job.job_id = "A".to_string();
    harness.enqueue(&job).await;

    harness.settle().await;

    let attempts = harness.delivery.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].attempt_number, 1);
    assert_eq!(attempts[1].attempt_number, 2);

    let names = harness.names.clone();
    let store = harness.stop().await;

    // The retry is observable in the retry log, nowhere else.
    assert_eq!(store.len(&names.retry_log).await.unwrap(), 1);
    let logged: EmailJob = serde_json::from_str(
        &store.move_one(&names.retry_log, "scratch").await.unwrap().unwrap(),
    )
    .unwrap();
    assert_eq!(logged.job_id, "A");
    assert_eq!(logged.attempt_number, 2);
    assert_eq!(store.len(&names.dead_letter).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn persistent_failure_exhausts_budget_into_dead_letter() {
    let harness = Harness::start(vec![
        Err(DeliveryError::server_error("boom")),
        Err(DeliveryError::server_error("boom")),
        Err(DeliveryError::server_error("boom")),
    ]);
    harness.enqueue(&EmailJob::new("user@example.com", "Welcome", "<p>Hi</p>")).await;

    harness.settle().await;

    // Attempts 1, 2, 3 all ran; no fourth claim.
    assert_eq!(harness.delivery.attempts().len(), 3);

    let names = harness.names.clone();
    let store = harness.stop().await;

    assert_eq!(store.len(&names.dead_letter).await.unwrap(), 1);
    assert_eq!(store.len(&names.retry_log).await.unwrap(), 2);

    let parked: EmailJob = serde_json::from_str(
        &store.move_one(&names.dead_letter, "scratch").await.unwrap().unwrap(),
    )
    .unwrap();
    assert_eq!(parked.attempt_number, 3);
}

#[tokio::test(start_paused = true)]
async fn malformed_entry_is_dropped_without_delivery() {
    let harness = Harness::start(vec![]);
    harness
        .store
        .push(&harness.names.pending, "{definitely not json")
        .await
        .unwrap();

    harness.settle().await;

    assert!(harness.delivery.attempts().is_empty());
    let names = harness.names.clone();
    let store = harness.stop().await;
    assert_eq!(store.len(&names.dead_letter).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn sweep_returns_stranded_jobs_to_the_consumer() {
    let config = QueueConfig::default();
    let names = QueueNames::new(&config.key_prefix);
    let store = Arc::new(InMemoryQueueStore::new());

    // Five jobs left behind by a dead consumer.
    for i in 0..5 {
        let mut job = EmailJob::new("user@example.com", "Welcome", "<p>Hi</p>");
        job.job_id = format!("stranded-{i}");
        store
            .push(&names.in_flight, &serde_json::to_string(&job).unwrap())
            .await
            .unwrap();
    }

    let sweeper = RecoverySweeper::new(store.clone(), &config);
    let recovered = sweeper.sweep_once().await.unwrap();
    assert_eq!(recovered, 5);
    assert_eq!(store.len(&names.in_flight).await.unwrap(), 0);
    assert_eq!(store.len(&names.pending).await.unwrap(), 5);

    // A fresh consumer now delivers all of them.
    let delivery = Arc::new(ScriptedDelivery::new(vec![]));
    let consumer = EmailQueueConsumer::new(store.clone(), delivery.clone(), config);
    let shutdown = CancellationToken::new();
    let task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { consumer.run(shutdown).await })
    };

    for _ in 0..2_000 {
        if delivery.attempts().len() == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(delivery.attempts().len(), 5);
    // Recovery did not count as an attempt.
    assert!(delivery.attempts().iter().all(|job| job.attempt_number == 1));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(60), task)
        .await
        .expect("consumer loop did not stop")
        .unwrap();

    let stats = QueueStatsReader::new(store, names);
    let snapshot = stats.snapshot().await;
    assert_eq!(snapshot.total, 0);
}
