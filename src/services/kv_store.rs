use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Debug, Error)]
pub enum KvError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("value at '{0}' is not an integer")]
    NotAnInteger(String),
}

pub type KvResult<T> = Result<T, KvError>;

/// Remote key-value primitives the cache adapter is built on.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Store a value, replacing any previous value and expiry.
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> KvResult<()>;

    async fn delete(&self, key: &str) -> KvResult<()>;

    /// Add `delta`, treating a missing key as 0. Keeps an existing expiry.
    async fn incr_by(&self, key: &str, delta: i64) -> KvResult<i64>;

    /// Add `delta` and arm a `ttl_seconds` expiry whenever the key has none,
    /// in one atomic step.
    async fn incr_with_expiry(&self, key: &str, delta: i64, ttl_seconds: u64) -> KvResult<i64>;

    /// Subtract one, never going below zero.
    async fn decr_clamped(&self, key: &str) -> KvResult<i64>;

    /// Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl_seconds: u64) -> KvResult<bool>;

    /// Remaining time to live, `None` for missing keys or keys without expiry.
    async fn ttl(&self, key: &str) -> KvResult<Option<u64>>;

    /// Set only if absent. True when this call created the key.
    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: u64) -> KvResult<bool>;

    /// Delete the key only while it still holds `value`. True when deleted.
    async fn delete_if_equals(&self, key: &str, value: &str) -> KvResult<bool>;

    /// Atomically subtract `amount` if the current value (or `initial` when the
    /// key is missing) covers it. Returns the new value, or `None` without
    /// writing anything when it does not.
    async fn decrement_if_sufficient(
        &self,
        key: &str,
        amount: i64,
        initial: i64,
    ) -> KvResult<Option<i64>>;
}

const DECR_CLAMPED_SCRIPT: &str = r#"
local value = redis.call('DECR', KEYS[1])
if value < 0 then
  redis.call('SET', KEYS[1], 0, 'KEEPTTL')
  return 0
end
return value
"#;

const INCR_WITH_EXPIRY_SCRIPT: &str = r#"
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if redis.call('TTL', KEYS[1]) < 0 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return value
"#;

const DELETE_IF_EQUALS_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
"#;

const DECREMENT_IF_SUFFICIENT_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current then
  current = tonumber(current)
else
  current = tonumber(ARGV[2])
end
local amount = tonumber(ARGV[1])
if current < amount then
  return -1
end
redis.call('SET', KEYS[1], current - amount, 'KEEPTTL')
return current - amount
"#;

/// Redis-backed store. Connections are multiplexed and opened per call.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(url: &str) -> KvResult<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> KvResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> KvResult<()> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl_seconds {
            cmd.arg("EX").arg(ttl.max(1));
        }
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> KvResult<i64> {
        let mut conn = self.connection().await?;
        let value: i64 = conn.incr(key, delta).await?;
        Ok(value)
    }

    async fn incr_with_expiry(&self, key: &str, delta: i64, ttl_seconds: u64) -> KvResult<i64> {
        let mut conn = self.connection().await?;
        let value: i64 = redis::Script::new(INCR_WITH_EXPIRY_SCRIPT)
            .key(key)
            .arg(delta)
            .arg(ttl_seconds.max(1))
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn decr_clamped(&self, key: &str) -> KvResult<i64> {
        let mut conn = self.connection().await?;
        let value: i64 = redis::Script::new(DECR_CLAMPED_SCRIPT)
            .key(key)
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> KvResult<bool> {
        let mut conn = self.connection().await?;
        let applied: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(applied == 1)
    }

    async fn ttl(&self, key: &str) -> KvResult<Option<u64>> {
        let mut conn = self.connection().await?;
        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        // -2: missing key, -1: no expiry
        Ok(if ttl >= 0 { Some(ttl as u64) } else { None })
    }

    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: u64) -> KvResult<bool> {
        let mut conn = self.connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete_if_equals(&self, key: &str, value: &str) -> KvResult<bool> {
        let mut conn = self.connection().await?;
        let deleted: i64 = redis::Script::new(DELETE_IF_EQUALS_SCRIPT)
            .key(key)
            .arg(value)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }

    async fn decrement_if_sufficient(
        &self,
        key: &str,
        amount: i64,
        initial: i64,
    ) -> KvResult<Option<i64>> {
        let mut conn = self.connection().await?;
        let value: i64 = redis::Script::new(DECREMENT_IF_SUFFICIENT_SCRIPT)
            .key(key)
            .arg(amount)
            .arg(initial)
            .invoke_async(&mut conn)
            .await?;
        Ok(if value < 0 { None } else { Some(value) })
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

// Expired entries nobody reads again are dropped every this many writes
const SWEEP_INTERVAL: usize = 256;

/// Process-local store with the same semantics as `RedisStore`.
/// Used when no Redis URL is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_write(&self, entries: &mut HashMap<String, MemoryEntry>) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_INTERVAL == 0 {
            let now = Instant::now();
            let before = entries.len();
            entries.retain(|_, entry| entry.is_live(now));
            log::debug!("Swept {} expired entries", before - entries.len());
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    fn live_entry<'a>(
        entries: &'a mut HashMap<String, MemoryEntry>,
        key: &str,
    ) -> Option<&'a mut MemoryEntry> {
        let now = Instant::now();
        if entries.get(key).map_or(false, |entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    fn parse_int(key: &str, value: &str) -> KvResult<i64> {
        value
            .parse::<i64>()
            .map_err(|_| KvError::NotAnInteger(key.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> KvResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: ttl_seconds.map(|ttl| Instant::now() + Duration::from_secs(ttl)),
            },
        );
        self.record_write(&mut entries);
        Ok(())
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> KvResult<i64> {
        let mut entries = self.entries.lock().await;
        let value = match Self::live_entry(&mut entries, key) {
            Some(entry) => {
                let value = Self::parse_int(key, &entry.value)? + delta;
                entry.value = value.to_string();
                value
            }
            None => {
                entries.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: delta.to_string(),
                        expires_at: None,
                    },
                );
                delta
            }
        };
        self.record_write(&mut entries);
        Ok(value)
    }

    async fn incr_with_expiry(&self, key: &str, delta: i64, ttl_seconds: u64) -> KvResult<i64> {
        let mut entries = self.entries.lock().await;
        let deadline = Instant::now() + Duration::from_secs(ttl_seconds);
        let value = match Self::live_entry(&mut entries, key) {
            Some(entry) => {
                let value = Self::parse_int(key, &entry.value)? + delta;
                entry.value = value.to_string();
                entry.expires_at.get_or_insert(deadline);
                value
            }
            None => {
                entries.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: delta.to_string(),
                        expires_at: Some(deadline),
                    },
                );
                delta
            }
        };
        self.record_write(&mut entries);
        Ok(value)
    }

    async fn decr_clamped(&self, key: &str) -> KvResult<i64> {
        let mut entries = self.entries.lock().await;
        let value = match Self::live_entry(&mut entries, key) {
            Some(entry) => {
                let value = (Self::parse_int(key, &entry.value)? - 1).max(0);
                entry.value = value.to_string();
                value
            }
            None => {
                entries.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: "0".to_string(),
                        expires_at: None,
                    },
                );
                0
            }
        };
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> KvResult<bool> {
        let mut entries = self.entries.lock().await;
        match Self::live_entry(&mut entries, key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_seconds));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> KvResult<Option<u64>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        Ok(Self::live_entry(&mut entries, key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now).as_secs()))
    }

    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: u64) -> KvResult<bool> {
        let mut entries = self.entries.lock().await;
        if Self::live_entry(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            },
        );
        self.record_write(&mut entries);
        Ok(true)
    }

    async fn delete_if_equals(&self, key: &str, value: &str) -> KvResult<bool> {
        let mut entries = self.entries.lock().await;
        match Self::live_entry(&mut entries, key) {
            Some(entry) if entry.value == value => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn decrement_if_sufficient(
        &self,
        key: &str,
        amount: i64,
        initial: i64,
    ) -> KvResult<Option<i64>> {
        let mut entries = self.entries.lock().await;
        let (current, expires_at) = match Self::live_entry(&mut entries, key) {
            Some(entry) => (Self::parse_int(key, &entry.value)?, entry.expires_at),
            None => (initial, None),
        };
        if current < amount {
            return Ok(None);
        }
        let remaining = current - amount;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: remaining.to_string(),
                expires_at,
            },
        );
        Ok(Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_expires_entries() {
        let store = MemoryStore::new();
        store.set("greeting", "hello", Some(10)).await.unwrap();
        assert_eq!(store.get("greeting").await.unwrap().as_deref(), Some("hello"));
        assert_eq!(store.ttl("greeting").await.unwrap(), Some(10));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("greeting").await.unwrap(), None);
        assert_eq!(store.ttl("greeting").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_counters() {
        let store = MemoryStore::new();
        assert_eq!(store.incr_by("hits", 1).await.unwrap(), 1);
        assert_eq!(store.incr_by("hits", 4).await.unwrap(), 5);

        store.set("low", "1", None).await.unwrap();
        assert_eq!(store.decr_clamped("low").await.unwrap(), 0);
        assert_eq!(store.decr_clamped("low").await.unwrap(), 0);

        store.set("word", "abc", None).await.unwrap();
        assert!(matches!(
            store.incr_by("word", 1).await,
            Err(KvError::NotAnInteger(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_incr_keeps_expiry() {
        let store = MemoryStore::new();
        store.incr_by("window", 1).await.unwrap();
        assert!(store.expire("window", 5).await.unwrap());
        store.incr_by("window", 1).await.unwrap();
        assert_eq!(store.ttl("window").await.unwrap(), Some(5));
        assert!(!store.expire("missing", 5).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_with_expiry_arms_ttl_once() {
        let store = MemoryStore::new();
        assert_eq!(store.incr_with_expiry("window", 1, 60).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(store.incr_with_expiry("window", 1, 60).await.unwrap(), 2);
        assert_eq!(store.ttl("window").await.unwrap(), Some(40));

        tokio::time::advance(Duration::from_secs(41)).await;
        assert_eq!(store.incr_with_expiry("window", 1, 60).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_with_expiry_repairs_counter_without_ttl() {
        let store = MemoryStore::new();
        store.incr_by("usage", 5).await.unwrap();
        assert_eq!(store.ttl("usage").await.unwrap(), None);

        assert_eq!(store.incr_with_expiry("usage", 1, 30).await.unwrap(), 6);
        assert_eq!(store.ttl("usage").await.unwrap(), Some(30));
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.get("usage").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_if_equals_checks_value() {
        let store = MemoryStore::new();
        store.set("lock:a", "owner-1", Some(30)).await.unwrap();
        assert!(!store.delete_if_equals("lock:a", "owner-2").await.unwrap());
        assert_eq!(store.get("lock:a").await.unwrap().as_deref(), Some("owner-1"));

        assert!(store.delete_if_equals("lock:a", "owner-1").await.unwrap());
        assert_eq!(store.get("lock:a").await.unwrap(), None);
        assert!(!store.delete_if_equals("lock:a", "owner-1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_sweeps_expired_entries() {
        let store = MemoryStore::new();
        for index in 0..10 {
            store.set(&format!("preview:{}", index), "x", Some(1)).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.len().await, 10);

        for _ in 0..SWEEP_INTERVAL {
            store.incr_by("hits", 1).await.unwrap();
        }
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("hits").await.unwrap().as_deref(), Some("256"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_set_nx() {
        let store = MemoryStore::new();
        assert!(store.set_nx("lock:a", "1", 30).await.unwrap());
        assert!(!store.set_nx("lock:a", "1", 30).await.unwrap());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(store.set_nx("lock:a", "1", 30).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_decrement_if_sufficient() {
        let store = MemoryStore::new();
        // Missing key starts from the initial value
        assert_eq!(
            store.decrement_if_sufficient("credits", 3, 30).await.unwrap(),
            Some(27)
        );
        assert_eq!(store.get("credits").await.unwrap().as_deref(), Some("27"));

        store.set("credits", "2", None).await.unwrap();
        assert_eq!(store.decrement_if_sufficient("credits", 3, 30).await.unwrap(), None);
        assert_eq!(store.get("credits").await.unwrap().as_deref(), Some("2"));
        assert_eq!(
            store.decrement_if_sufficient("credits", 2, 30).await.unwrap(),
            Some(0)
        );
    }
}
