use std::sync::Arc;
use thiserror::Error;

use super::cache::{CacheError, CacheService};

#[derive(Debug, Error)]
pub enum CreditError {
    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: i64, available: i64 },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Credit checks in front of generation.
///
/// Users are charged only for freshly generated sheets, after the fact.
/// Cache hits and variants the model failed to produce are free.
pub struct CreditGate {
    cache: Arc<CacheService>,
}

impl CreditGate {
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self { cache }
    }

    /// Reject before any work when the balance cannot cover `required`.
    /// Returns the current balance on success.
    pub async fn check(&self, user_id: &str, required: u32) -> Result<i64, CreditError> {
        let available = self.cache.get_remaining_credits(user_id).await?;
        let required = required as i64;
        if available < required {
            log::info!(
                "User {} has {} credits, {} required",
                user_id,
                available,
                required
            );
            return Err(CreditError::InsufficientCredits {
                required,
                available,
            });
        }
        Ok(available)
    }

    /// Charge `amount` credits. A balance that shrank since `check` leaves the
    /// charge unapplied; the result is still delivered.
    pub async fn consume(&self, user_id: &str, amount: u32) -> Result<i64, CreditError> {
        if amount > 0 && !self.cache.use_credit(user_id, amount).await? {
            log::warn!(
                "Could not charge {} credits to user {}: balance changed during generation",
                amount,
                user_id
            );
        }
        self.remaining(user_id).await
    }

    pub async fn remaining(&self, user_id: &str) -> Result<i64, CreditError> {
        Ok(self.cache.get_remaining_credits(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::DEFAULT_STARTING_CREDITS;
    use crate::services::kv_store::MemoryStore;

    fn gate() -> (CreditGate, Arc<CacheService>) {
        let cache = Arc::new(CacheService::new(
            Arc::new(MemoryStore::new()),
            DEFAULT_STARTING_CREDITS,
        ));
        (CreditGate::new(cache.clone()), cache)
    }

    #[tokio::test]
    async fn test_new_user_has_starting_quota() {
        let (gate, _) = gate();
        assert_eq!(gate.check("user_1", 3).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_insufficient_credits_reports_both_counts() {
        let (gate, cache) = gate();
        cache.set_credits("user_1", 2).await.unwrap();

        let err = gate.check("user_1", 3).await.unwrap_err();
        assert!(matches!(
            err,
            CreditError::InsufficientCredits {
                required: 3,
                available: 2
            }
        ));
        assert_eq!(err.to_string(), "Insufficient credits: 3 required, 2 available");
        assert_eq!(gate.remaining("user_1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_consume_charges_balance() {
        let (gate, cache) = gate();
        cache.set_credits("user_1", 5).await.unwrap();

        assert_eq!(gate.consume("user_1", 2).await.unwrap(), 3);
        assert_eq!(gate.consume("user_1", 0).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_consume_never_goes_negative() {
        let (gate, cache) = gate();
        cache.set_credits("user_1", 1).await.unwrap();

        assert_eq!(gate.consume("user_1", 2).await.unwrap(), 1);
    }
}
