//! Discount Ledger
//!
//! Validates codes against a cart and consumes uses at order commit time.
//! All shared state lives in the backing store; the only synchronization is
//! the store's own conditional write, so two checkouts racing for the last
//! use of a code are serialized by the database, not by this process.

use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::discount::{
    normalize_code, AppliedDiscount, DiscountCode, DiscountError,
};

/// Outcome of the store's conditional increment.
#[derive(Clone, Debug, PartialEq)]
pub enum Redemption {
    Consumed(AppliedDiscount),
    LimitReached,
    NotFound,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Rejected(#[from] DiscountError),
    #[error("discount store unavailable")]
    Store(#[from] sqlx::Error),
}

/// Data access for discount codes. `consume_use` must be a single atomic
/// conditional update evaluated by the store; a read followed by a separate
/// write does not satisfy the contract.
pub trait DiscountStore: Send + Sync {
    /// Lookup by canonical code, restricted to active codes.
    fn find_active(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<DiscountCode>, sqlx::Error>> + Send;

    /// Increment the usage counter by one, only if the limit allows it.
    fn consume_use(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Redemption, sqlx::Error>> + Send;
}

#[derive(Clone)]
pub struct Ledger<S> {
    store: S,
}

impl<S: DiscountStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate a raw code against the current cart. Side-effect-free and
    /// idempotent: shoppers re-validate while editing their cart and the
    /// usage counter must not move until an order actually commits.
    pub async fn validate(
        &self,
        raw_code: &str,
        cart_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<AppliedDiscount, LedgerError> {
        let code = normalize_code(raw_code);
        let discount = self
            .store
            .find_active(&code)
            .await?
            .ok_or(DiscountError::NotFound)?;
        Ok(discount.check(cart_total, now)?)
    }

    /// Consume one use of the code. Called exactly once, when an order
    /// transitions to paid. Returns `LimitReached` when a concurrent
    /// redemption exhausted the code between validate and redeem; the
    /// caller drops the discount from the order rather than overselling it.
    pub async fn redeem(&self, raw_code: &str) -> Result<AppliedDiscount, LedgerError> {
        let code = normalize_code(raw_code);
        match self.store.consume_use(&code).await? {
            Redemption::Consumed(applied) => Ok(applied),
            Redemption::LimitReached => Err(DiscountError::LimitReached.into()),
            Redemption::NotFound => Err(DiscountError::NotFound.into()),
        }
    }
}

/// Postgres-backed store. The increment is one conditional `UPDATE`; the
/// `WHERE` clause is what upholds `used_count <= usage_limit` under
/// concurrent redemption.
#[derive(Clone)]
pub struct PgDiscountStore {
    pool: sqlx::PgPool,
}

impl PgDiscountStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

impl DiscountStore for PgDiscountStore {
    async fn find_active(&self, code: &str) -> Result<Option<DiscountCode>, sqlx::Error> {
        sqlx::query_as::<_, DiscountCode>(
            "SELECT * FROM discount_codes WHERE code = $1 AND status = 'active'",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
    }

    async fn consume_use(&self, code: &str) -> Result<Redemption, sqlx::Error> {
        let applied = sqlx::query_as::<_, AppliedDiscount>(
            "UPDATE discount_codes \
             SET used_count = used_count + 1, updated_at = NOW() \
             WHERE code = $1 AND status = 'active' \
               AND (usage_limit IS NULL OR used_count < usage_limit) \
             RETURNING code, kind, value",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(applied) = applied {
            return Ok(Redemption::Consumed(applied));
        }
        // Zero rows: either the code does not exist (or is inactive) or the
        // limit is exhausted. Only the failure path pays for this read.
        let exists: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM discount_codes WHERE code = $1 AND status = 'active'",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(match exists {
            Some(_) => Redemption::LimitReached,
            None => Redemption::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::discount::{DiscountKind, DiscountStatus};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    /// In-memory store with the same conditional-update contract as the
    /// Postgres store: the check and the increment happen under one lock.
    #[derive(Default)]
    struct MemStore {
        codes: Mutex<HashMap<String, DiscountCode>>,
    }

    impl MemStore {
        fn insert(&self, d: DiscountCode) {
            self.codes.lock().unwrap().insert(d.code.clone(), d);
        }

        fn used_count(&self, code: &str) -> i32 {
            self.codes.lock().unwrap()[code].used_count
        }
    }

    impl DiscountStore for MemStore {
        async fn find_active(&self, code: &str) -> Result<Option<DiscountCode>, sqlx::Error> {
            let codes = self.codes.lock().unwrap();
            Ok(codes
                .get(code)
                .filter(|d| d.status == DiscountStatus::Active)
                .cloned())
        }

        async fn consume_use(&self, code: &str) -> Result<Redemption, sqlx::Error> {
            let mut codes = self.codes.lock().unwrap();
            let Some(d) = codes.get_mut(code).filter(|d| d.status == DiscountStatus::Active)
            else {
                return Ok(Redemption::NotFound);
            };
            if d.usage_limit.is_some_and(|limit| d.used_count >= limit) {
                return Ok(Redemption::LimitReached);
            }
            d.used_count += 1;
            Ok(Redemption::Consumed(AppliedDiscount {
                code: d.code.clone(),
                kind: d.kind,
                value: d.value,
            }))
        }
    }

    fn discount(code: &str, usage_limit: Option<i32>) -> DiscountCode {
        let now = Utc::now();
        DiscountCode {
            id: Uuid::new_v4(),
            code: code.into(),
            kind: DiscountKind::Percentage,
            value: Decimal::new(20, 0),
            status: DiscountStatus::Active,
            expires_at: None,
            min_purchase: Decimal::ZERO,
            usage_limit,
            used_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_validate_matches_unnormalized_input() {
        let store = MemStore::default();
        store.insert(discount("SAVE10", None));
        let ledger = Ledger::new(store);
        let now = Utc::now();
        for raw in ["save10", " Save10 ", "SAVE10"] {
            let applied = ledger.validate(raw, Decimal::new(50, 0), now).await.unwrap();
            assert_eq!(applied.code, "SAVE10");
        }
    }

    #[tokio::test]
    async fn test_validate_has_no_side_effects() {
        let store = MemStore::default();
        store.insert(discount("SAVE10", Some(1)));
        let ledger = Ledger::new(store);
        let now = Utc::now();
        ledger.validate("SAVE10", Decimal::new(50, 0), now).await.unwrap();
        ledger.validate("SAVE10", Decimal::new(50, 0), now).await.unwrap();
        assert_eq!(ledger.store.used_count("SAVE10"), 0);
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let ledger = Ledger::new(MemStore::default());
        let err = ledger
            .validate("NOPE", Decimal::new(50, 0), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(DiscountError::NotFound)));
        let err = ledger.redeem("NOPE").await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(DiscountError::NotFound)));
    }

    #[tokio::test]
    async fn test_single_use_code_redeems_once() {
        let store = MemStore::default();
        store.insert(discount("WELCOME20", Some(1)));
        let ledger = Ledger::new(store);

        let applied = ledger.redeem("WELCOME20").await.unwrap();
        assert_eq!(applied.value, Decimal::new(20, 0));
        assert_eq!(ledger.store.used_count("WELCOME20"), 1);

        let err = ledger.redeem("WELCOME20").await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(DiscountError::LimitReached)));
        assert_eq!(ledger.store.used_count("WELCOME20"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_redeems_never_exceed_limit() {
        let store = MemStore::default();
        store.insert(discount("LAST3", Some(3)));
        let ledger = Arc::new(Ledger::new(store));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move { ledger.redeem("LAST3").await }));
        }

        let mut consumed = 0;
        let mut limit_reached = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => consumed += 1,
                Err(LedgerError::Rejected(DiscountError::LimitReached)) => limit_reached += 1,
                Err(other) => panic!("unexpected outcome: {other}"),
            }
        }
        assert_eq!(consumed, 3);
        assert_eq!(limit_reached, 13);
        assert_eq!(ledger.store.used_count("LAST3"), 3);
    }
}
