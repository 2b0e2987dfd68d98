//! Discount Code domain logic
//!
//! Pure validation and arithmetic for discount codes. Nothing here touches
//! the database; the ledger wires these checks to storage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Codes are matched case-insensitively and ignore surrounding whitespace.
/// The canonical form (stored and looked up) is trimmed upper-case.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "discount_kind", rename_all = "lowercase")]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "discount_status", rename_all = "lowercase")]
pub enum DiscountStatus {
    Active,
    Inactive,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub id: Uuid,
    pub code: String,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub status: DiscountStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub min_purchase: Decimal,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a code cannot be applied to a cart. Checks are evaluated in a fixed
/// order and the first failure wins.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DiscountError {
    #[error("discount code not found")]
    NotFound,
    #[error("discount code has expired")]
    Expired,
    #[error("discount code usage limit reached")]
    LimitReached,
    #[error("cart total below minimum purchase of {min}")]
    BelowMinimum { min: Decimal },
}

/// The shopper-facing result of a successful validation or redemption.
/// Deliberately excludes the usage counters.
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscount {
    pub code: String,
    pub kind: DiscountKind,
    pub value: Decimal,
}

impl DiscountCode {
    /// Side-effect-free validation against a cart. Check order: expiry,
    /// usage limit, minimum purchase. Status and existence are handled by
    /// the lookup itself.
    pub fn check(
        &self,
        cart_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<AppliedDiscount, DiscountError> {
        if let Some(expires_at) = self.expires_at {
            if expires_at < now {
                return Err(DiscountError::Expired);
            }
        }
        if let Some(limit) = self.usage_limit {
            if self.used_count >= limit {
                return Err(DiscountError::LimitReached);
            }
        }
        if cart_total < self.min_purchase {
            return Err(DiscountError::BelowMinimum {
                min: self.min_purchase,
            });
        }
        Ok(AppliedDiscount {
            code: self.code.clone(),
            kind: self.kind,
            value: self.value,
        })
    }
}

impl AppliedDiscount {
    /// Amount deducted from `subtotal`, rounded to 2 decimal places.
    /// A fixed discount never exceeds the subtotal.
    pub fn amount_off(&self, subtotal: Decimal) -> Decimal {
        match self.kind {
            DiscountKind::Percentage => {
                (subtotal * self.value / Decimal::ONE_HUNDRED).round_dp(2)
            }
            DiscountKind::Fixed => self.value.min(subtotal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(kind: DiscountKind, value: Decimal) -> DiscountCode {
        let now = Utc::now();
        DiscountCode {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            kind,
            value,
            status: DiscountStatus::Active,
            expires_at: None,
            min_purchase: Decimal::ZERO,
            usage_limit: None,
            used_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_code_normalization() {
        assert_eq!(normalize_code("save10"), "SAVE10");
        assert_eq!(normalize_code(" Save10 "), "SAVE10");
        assert_eq!(normalize_code("SAVE10"), "SAVE10");
    }

    #[test]
    fn test_minimum_purchase_boundary() {
        let mut d = code(DiscountKind::Percentage, Decimal::new(10, 0));
        d.min_purchase = Decimal::new(100, 0);
        let now = Utc::now();
        assert_eq!(
            d.check(Decimal::new(9999, 2), now),
            Err(DiscountError::BelowMinimum { min: Decimal::new(100, 0) })
        );
        assert!(d.check(Decimal::new(100, 0), now).is_ok());
    }

    #[test]
    fn test_expired_code_fails_regardless_of_other_fields() {
        let mut d = code(DiscountKind::Fixed, Decimal::new(5, 0));
        d.expires_at = Some(Utc::now() - Duration::hours(1));
        d.min_purchase = Decimal::new(1000, 0); // expiry is checked first
        assert_eq!(d.check(Decimal::new(50, 0), Utc::now()), Err(DiscountError::Expired));
    }

    #[test]
    fn test_exhausted_limit_fails_check() {
        let mut d = code(DiscountKind::Percentage, Decimal::new(20, 0));
        d.usage_limit = Some(5);
        d.used_count = 5;
        assert_eq!(d.check(Decimal::new(50, 0), Utc::now()), Err(DiscountError::LimitReached));
        d.used_count = 4;
        assert!(d.check(Decimal::new(50, 0), Utc::now()).is_ok());
    }

    #[test]
    fn test_validation_never_exposes_counters() {
        let mut d = code(DiscountKind::Percentage, Decimal::new(20, 0));
        d.usage_limit = Some(10);
        d.used_count = 3;
        let applied = d.check(Decimal::new(50, 0), Utc::now()).unwrap();
        assert_eq!(applied.code, "SAVE10");
        assert_eq!(applied.kind, DiscountKind::Percentage);
        assert_eq!(applied.value, Decimal::new(20, 0));
    }

    #[test]
    fn test_percentage_amount_off() {
        let applied = AppliedDiscount {
            code: "WELCOME20".into(),
            kind: DiscountKind::Percentage,
            value: Decimal::new(20, 0),
        };
        assert_eq!(applied.amount_off(Decimal::new(150, 0)), Decimal::new(30, 0));
        // 20% of 99.99 = 19.998 -> rounds to 20.00
        assert_eq!(applied.amount_off(Decimal::new(9999, 2)), Decimal::new(2000, 2));
    }

    #[test]
    fn test_fixed_amount_off_capped_at_subtotal() {
        let applied = AppliedDiscount {
            code: "TENOFF".into(),
            kind: DiscountKind::Fixed,
            value: Decimal::new(10, 0),
        };
        assert_eq!(applied.amount_off(Decimal::new(50, 0)), Decimal::new(10, 0));
        assert_eq!(applied.amount_off(Decimal::new(6, 0)), Decimal::new(6, 0));
    }
}
