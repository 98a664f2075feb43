use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;

/// Integer counters with per-key TTL, backing the rate-limit policies.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value, or `None` if the key is absent or expired.
    async fn get(&self, key: &str) -> anyhow::Result<Option<i64>>;

    /// Set a value with a TTL, replacing any existing entry.
    async fn set_with_ttl(&self, key: &str, value: i64, ttl_secs: u64) -> anyhow::Result<()>;

    /// Atomically increment and return the new value. A missing key counts
    /// from zero; an existing key keeps its TTL.
    async fn incr(&self, key: &str) -> anyhow::Result<i64>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Redis-backed counter store.
pub struct RedisCounterStore {
    client: redis::Client,
}

impl RedisCounterStore {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        tracing::info!(url = %url, "redis counter store initialized");
        Ok(Self { client })
    }

    async fn conn(&self) -> anyhow::Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<i64>> {
        let mut conn = self.conn().await?;
        let value: Option<i64> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: i64, ttl_secs: u64) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> anyhow::Result<i64> {
        let mut conn = self.conn().await?;
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let _: u64 = conn.del(key).await?;
        Ok(())
    }
}

/// In-memory counter store for tests and the fake app state.
#[derive(Default)]
pub struct InMemoryCounterStore {
    entries: Mutex<HashMap<String, (i64, Option<Instant>)>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(entry: Option<&(i64, Option<Instant>)>) -> Option<i64> {
        match entry {
            Some((_, Some(deadline))) if *deadline <= Instant::now() => None,
            Some((value, _)) => Some(*value),
            None => None,
        }
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<i64>> {
        let entries = self.entries.lock().unwrap();
        Ok(Self::live_value(entries.get(key)))
    }

    async fn set_with_ttl(&self, key: &str, value: i64, ttl_secs: u64) -> anyhow::Result<()> {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, Some(deadline)));
        Ok(())
    }

    async fn incr(&self, key: &str) -> anyhow::Result<i64> {
        let mut entries = self.entries.lock().unwrap();
        let next = match Self::live_value(entries.get(key)) {
            Some(value) => {
                let expiry = entries.get(key).and_then(|(_, e)| *e);
                entries.insert(key.to_string(), (value + 1, expiry));
                value + 1
            }
            None => {
                entries.insert(key.to_string(), (1, None));
                1
            }
        };
        Ok(next)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_incr_keeps_counting() {
        let store = InMemoryCounterStore::new();
        store.set_with_ttl("k", 0, 300).await.unwrap();
        assert_eq!(store.incr("k").await.unwrap(), 1);
        assert_eq!(store.incr("k").await.unwrap(), 2);
        assert_eq!(store.get("k").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn incr_on_missing_key_starts_at_one() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.incr("fresh").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_treated_as_missing() {
        let store = InMemoryCounterStore::new();
        store.set_with_ttl("k", 5, 0).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        // a new increment starts over rather than resuming the stale count
        assert_eq!(store.incr("k").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = InMemoryCounterStore::new();
        store.set_with_ttl("k", 3, 300).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
