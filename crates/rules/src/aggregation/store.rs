//! Counter storage behind the aggregation service.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::StoreError;

/// Atomic keyed counters with expiry.
///
/// Concurrent increments of the same key must each be applied exactly once;
/// the engine does not serialize them itself.
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Add one to `key`, (re)setting its time-to-live. Returns the new value.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;

    /// Current values for `keys`, in order. Missing or expired keys read as 0.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<u64>, StoreError>;
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: u64,
    expires_at: Instant,
}

/// Process-local [`CounterStore`] for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired counters. Reads already ignore them.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.counters.lock().expect("counter store lock poisoned");
        let before = guard.len();
        guard.retain(|_, c| c.expires_at > now);
        before - guard.len()
    }

    pub fn len(&self) -> usize {
        self.counters.lock().expect("counter store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut guard = self.counters.lock().expect("counter store lock poisoned");
        let counter = guard.entry(key.to_string()).or_insert(Counter {
            value: 0,
            expires_at: now,
        });
        if counter.expires_at <= now {
            counter.value = 0;
        }
        counter.value += 1;
        counter.expires_at = now + ttl;
        Ok(counter.value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<u64>, StoreError> {
        let now = Instant::now();
        let guard = self.counters.lock().expect("counter store lock poisoned");
        Ok(keys
            .iter()
            .map(|k| match guard.get(k) {
                Some(c) if c.expires_at > now => c.value,
                _ => 0,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counters_expire_after_ttl() {
        let store = InMemoryCounterStore::new();
        let ttl = Duration::from_secs(12);
        assert_eq!(store.increment("k", ttl).await.unwrap(), 1);
        assert_eq!(store.increment("k", ttl).await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(13)).await;
        assert_eq!(store.get_many(&["k".to_string()]).await.unwrap(), vec![0]);
        assert_eq!(store.purge_expired(), 1);

        assert_eq!(store.increment("k", ttl).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_apply_exactly_once() {
        let store = std::sync::Arc::new(InMemoryCounterStore::new());
        let ttl = Duration::from_secs(60);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    for _ in 0..25 {
                        seen.push(store.increment("shared", ttl).await.unwrap());
                        tokio::task::yield_now().await;
                    }
                    seen
                })
            })
            .collect();

        let mut seen: Vec<u64> = Vec::new();
        for handle in handles {
            seen.extend(handle.await.unwrap());
        }
        seen.sort_unstable();

        // Every increment observed a distinct value: none lost, none doubled.
        assert_eq!(seen, (1..=800).collect::<Vec<u64>>());
        assert_eq!(store.get_many(&["shared".to_string()]).await.unwrap(), vec![800]);
    }

    #[tokio::test]
    async fn missing_keys_read_zero() {
        let store = InMemoryCounterStore::new();
        store.increment("a", Duration::from_secs(60)).await.unwrap();
        let values = store
            .get_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![1, 0]);
    }
}
