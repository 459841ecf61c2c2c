use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use super::kv_store::{KeyValueStore, KvError};

pub const SHEET_CACHE_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
pub const USAGE_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;
pub const DEFAULT_STARTING_CREDITS: i64 = 30;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] KvError),
    #[error("failed to (de)serialize cached value: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

pub fn usage_key(user_id: &str, date: &str, action: &str) -> String {
    format!("usage:{}:{}:{}", user_id, date, action)
}

pub fn credits_key(user_id: &str) -> String {
    format!("credits:{}", user_id)
}

pub fn rate_limit_key(identifier: &str) -> String {
    format!("ratelimit:{}", identifier)
}

pub fn lock_key(key: &str) -> String {
    format!("lock:{}", key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining: i64,
    pub reset_in_seconds: u64,
}

/// Typed cache, counter, lock, rate-limit and credit operations over a
/// `KeyValueStore`. Values are stored as JSON.
pub struct CacheService {
    store: Arc<dyn KeyValueStore>,
    starting_credits: i64,
}

impl CacheService {
    pub fn new(store: Arc<dyn KeyValueStore>, starting_credits: i64) -> Self {
        Self {
            store,
            starting_credits,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw, ttl_seconds).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        self.store.delete(key).await?;
        Ok(())
    }

    /// Increment a counter. When `ttl_seconds` is given the expiry is armed
    /// by the increment that creates the key, or by any later one that finds
    /// the key without an expiry.
    pub async fn incr(&self, key: &str, ttl_seconds: Option<u64>) -> CacheResult<i64> {
        self.incr_by(key, 1, ttl_seconds).await
    }

    pub async fn incr_by(&self, key: &str, delta: i64, ttl_seconds: Option<u64>) -> CacheResult<i64> {
        let value = match ttl_seconds {
            Some(ttl) => self.store.incr_with_expiry(key, delta, ttl).await?,
            None => self.store.incr_by(key, delta).await?,
        };
        Ok(value)
    }

    /// Decrement a counter, clamped at zero.
    pub async fn decr(&self, key: &str) -> CacheResult<i64> {
        Ok(self.store.decr_clamped(key).await?)
    }

    /// Try to take `lock:{key}`. Never waits: `None` means someone else holds
    /// it. The returned token identifies this holder to `release_lock`.
    pub async fn acquire_lock(&self, key: &str, ttl_seconds: u64) -> CacheResult<Option<String>> {
        let token = uuid::Uuid::new_v4().to_string();
        let acquired = self.store.set_nx(&lock_key(key), &token, ttl_seconds).await?;
        Ok(acquired.then_some(token))
    }

    /// Release the lock if `token` still owns it. A lock that expired and was
    /// taken by someone else is left alone and false is returned.
    pub async fn release_lock(&self, key: &str, token: &str) -> CacheResult<bool> {
        Ok(self.store.delete_if_equals(&lock_key(key), token).await?)
    }

    /// Fixed-window rate limit. Fails open when the store is unreachable.
    pub async fn rate_limit(&self, identifier: &str, limit: i64, window_seconds: u64) -> RateLimitStatus {
        match self.try_rate_limit(identifier, limit, window_seconds).await {
            Ok(status) => status,
            Err(e) => {
                log::warn!("Rate limit check for '{}' failed open: {}", identifier, e);
                RateLimitStatus {
                    allowed: true,
                    remaining: limit,
                    reset_in_seconds: window_seconds,
                }
            }
        }
    }

    async fn try_rate_limit(
        &self,
        identifier: &str,
        limit: i64,
        window_seconds: u64,
    ) -> CacheResult<RateLimitStatus> {
        let key = rate_limit_key(identifier);
        let count = self.store.incr_with_expiry(&key, 1, window_seconds).await?;
        let reset_in_seconds = self.store.ttl(&key).await?.unwrap_or(window_seconds);

        Ok(RateLimitStatus {
            allowed: count <= limit,
            remaining: (limit - count).max(0),
            reset_in_seconds,
        })
    }

    /// Record `amount` uses of `action` for today (UTC), kept for 30 days.
    pub async fn track_usage(&self, user_id: &str, action: &str, amount: i64) -> CacheResult<i64> {
        let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        self.incr_by(&usage_key(user_id, &date, action), amount, Some(USAGE_TTL_SECONDS))
            .await
    }

    pub async fn get_usage(&self, user_id: &str, date: &str, action: &str) -> CacheResult<i64> {
        Ok(self.get::<i64>(&usage_key(user_id, date, action)).await?.unwrap_or(0))
    }

    /// Current balance; users without a stored balance have the starting quota.
    pub async fn get_remaining_credits(&self, user_id: &str) -> CacheResult<i64> {
        Ok(self
            .get::<i64>(&credits_key(user_id))
            .await?
            .unwrap_or(self.starting_credits))
    }

    /// Spend `amount` credits atomically. Returns false, leaving the balance
    /// untouched, when the balance does not cover it.
    pub async fn use_credit(&self, user_id: &str, amount: u32) -> CacheResult<bool> {
        let remaining = self
            .store
            .decrement_if_sufficient(&credits_key(user_id), amount as i64, self.starting_credits)
            .await?;
        Ok(remaining.is_some())
    }

    pub async fn set_credits(&self, user_id: &str, balance: u32) -> CacheResult<()> {
        self.set(&credits_key(user_id), &balance, None).await
    }
}
