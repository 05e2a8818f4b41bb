//! Queue storage over named, ordered, durable lists.
//!
//! The store is the single shared mutable resource: all cross-task safety
//! comes from the atomicity of these primitives, not from in-process locks.
//! Every operation may fail with `StoreUnavailable`, in which case callers
//! must not assume any side effect occurred.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use crate::error::{MailroomError, Result};

/// Atomic primitives over named lists.
///
/// Lists are FIFO: `push` appends to the tail, claims pop from the head.
/// Removal matches the exact stored entry by value, never by job identity;
/// the store has no secondary index.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Atomically pop the oldest entry of `src` and append it to `dst`,
    /// blocking up to `timeout` while `src` is empty.
    async fn pop_and_claim(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>>;

    /// Same move as [`pop_and_claim`](Self::pop_and_claim) without blocking.
    async fn move_one(&self, src: &str, dst: &str) -> Result<Option<String>>;

    /// Append a payload to the tail of `list`.
    async fn push(&self, list: &str, payload: &str) -> Result<()>;

    /// Remove one entry of `list` equal to `payload`. A miss is a no-op.
    async fn remove_one(&self, list: &str, payload: &str) -> Result<()>;

    /// Get the current length of `list`.
    async fn len(&self, list: &str) -> Result<usize>;
}

/// Redis-backed store for production use.
///
/// Uses `LPUSH` for appends and `BRPOPLPUSH`/`RPOPLPUSH` for claims, so the
/// tail of the logical FIFO is the head of the Redis list.
pub struct RedisQueueStore {
    client: redis::Client,
}

impl RedisQueueStore {
    /// Create a new Redis-backed store from a connected client.
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Obtain an async multiplexed connection from the Redis client.
    async fn get_conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| MailroomError::store_unavailable(e.to_string()))
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn pop_and_claim(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let mut conn = self.get_conn().await?;

        // BRPOPLPUSH with timeout 0 blocks forever; clamp to at least 1s.
        let timeout_secs = timeout.as_secs().max(1);
        let claimed: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(src)
            .arg(dst)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| MailroomError::store_unavailable(e.to_string()))?;

        Ok(claimed)
    }

    async fn move_one(&self, src: &str, dst: &str) -> Result<Option<String>> {
        let mut conn = self.get_conn().await?;

        let moved: Option<String> = redis::cmd("RPOPLPUSH")
            .arg(src)
            .arg(dst)
            .query_async(&mut conn)
            .await
            .map_err(|e| MailroomError::store_unavailable(e.to_string()))?;

        Ok(moved)
    }

    async fn push(&self, list: &str, payload: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;

        redis::cmd("LPUSH")
            .arg(list)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| MailroomError::store_unavailable(e.to_string()))?;

        Ok(())
    }

    async fn remove_one(&self, list: &str, payload: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;

        let removed: i64 = redis::cmd("LREM")
            .arg(list)
            .arg(1)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| MailroomError::store_unavailable(e.to_string()))?;

        if removed == 0 {
            tracing::debug!(list, "remove_one found no matching entry");
        }

        Ok(())
    }

    async fn len(&self, list: &str) -> Result<usize> {
        let mut conn = self.get_conn().await?;

        let length: usize = redis::cmd("LLEN")
            .arg(list)
            .query_async(&mut conn)
            .await
            .map_err(|e| MailroomError::store_unavailable(e.to_string()))?;

        Ok(length)
    }
}

/// In-memory store for tests and development.
pub struct InMemoryQueueStore {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    arrivals: Notify,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
            arrivals: Notify::new(),
        }
    }

    async fn take(&self, src: &str, dst: &str) -> Option<String> {
        let mut lists = self.lists.lock().await;
        let payload = lists.get_mut(src)?.pop_front()?;
        lists.entry(dst.to_string()).or_default().push_back(payload.clone());
        Some(payload)
    }
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn pop_and_claim(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(payload) = self.take(src, dst).await {
                return Ok(Some(payload));
            }

            let notified = self.arrivals.notified();
            // Re-check after registering, so a push between the first check
            // and `notified()` is not missed.
            if let Some(payload) = self.take(src, dst).await {
                return Ok(Some(payload));
            }

            let Some(remaining) =
                deadline.checked_duration_since(tokio::time::Instant::now())
            else {
                return Ok(None);
            };
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn move_one(&self, src: &str, dst: &str) -> Result<Option<String>> {
        Ok(self.take(src, dst).await)
    }

    async fn push(&self, list: &str, payload: &str) -> Result<()> {
        let mut lists = self.lists.lock().await;
        lists
            .entry(list.to_string())
            .or_default()
            .push_back(payload.to_string());
        drop(lists);
        self.arrivals.notify_waiters();
        Ok(())
    }

    async fn remove_one(&self, list: &str, payload: &str) -> Result<()> {
        let mut lists = self.lists.lock().await;
        if let Some(entries) = lists.get_mut(list) {
            if let Some(position) = entries.iter().position(|e| e == payload) {
                entries.remove(position);
            }
        }
        Ok(())
    }

    async fn len(&self, list: &str) -> Result<usize> {
        let lists = self.lists.lock().await;
        Ok(lists.get(list).map_or(0, |entries| entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_and_claim_preserve_fifo_order() {
        let store = InMemoryQueueStore::new();
        store.push("pending", "first").await.unwrap();
        store.push("pending", "second").await.unwrap();

        let claimed = store
            .pop_and_claim("pending", "in-flight", Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(claimed.as_deref(), Some("first"));
        assert_eq!(store.len("pending").await.unwrap(), 1);
        assert_eq!(store.len("in-flight").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pop_and_claim_times_out_on_empty_list() {
        let store = InMemoryQueueStore::new();
        let claimed = store
            .pop_and_claim("pending", "in-flight", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_pop_wakes_on_push() {
        let store = std::sync::Arc::new(InMemoryQueueStore::new());
        let popper = store.clone();
        let handle = tokio::spawn(async move {
            popper
                .pop_and_claim("pending", "in-flight", Duration::from_secs(30))
                .await
                .unwrap()
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        store.push("pending", "late-arrival").await.unwrap();

        let claimed = handle.await.unwrap();
        assert_eq!(claimed.as_deref(), Some("late-arrival"));
    }

    #[tokio::test]
    async fn remove_one_matches_exact_payload() {
        let store = InMemoryQueueStore::new();
        store.push("in-flight", "a").await.unwrap();
        store.push("in-flight", "b").await.unwrap();
        store.push("in-flight", "a").await.unwrap();

        store.remove_one("in-flight", "a").await.unwrap();
        assert_eq!(store.len("in-flight").await.unwrap(), 2);

        // A mismatch is a no-op, not an error.
        store.remove_one("in-flight", "missing").await.unwrap();
        assert_eq!(store.len("in-flight").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn move_one_returns_none_on_empty() {
        let store = InMemoryQueueStore::new();
        assert!(store.move_one("in-flight", "pending").await.unwrap().is_none());
    }
}
