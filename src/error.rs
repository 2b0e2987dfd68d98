//! API error taxonomy
//!
//! Every failure a handler can produce, mapped to a status code and a
//! user-facing message. Store failures are logged in full and surfaced
//! generically.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::domain::discount::DiscountError;
use crate::ledger::LedgerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Discount(#[from] DiscountError),
    #[error("Authentication required")]
    Unauthorized,
    #[error("You do not have permission to perform this action")]
    Forbidden,
    #[error("{0}")]
    InvalidInput(String),
    #[error("A discount with this code already exists")]
    DuplicateCode,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Something went wrong")]
    Store(#[from] sqlx::Error),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(e) => ApiError::Discount(e),
            LedgerError::Store(e) => ApiError::Store(e),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Discount(_) | ApiError::InvalidInput(_) | ApiError::DuplicateCode => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the client. Rejected discounts collapse to one
    /// generic message except the minimum-purchase case, which names the
    /// amount; this mirrors the storefront's observed behavior and is
    /// intentionally not more specific.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Discount(DiscountError::BelowMinimum { min }) => {
                format!("A minimum purchase of {min} is required to use this discount")
            }
            ApiError::Discount(_) => "Invalid or expired discount code".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(ref e) = self {
            tracing::error!(error = %e, "store operation failed");
        }
        let body = Json(serde_json::json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_rejections_collapse_to_one_message() {
        for e in [
            DiscountError::NotFound,
            DiscountError::Expired,
            DiscountError::LimitReached,
        ] {
            let api: ApiError = e.into();
            assert_eq!(api.status(), StatusCode::BAD_REQUEST);
            assert_eq!(api.public_message(), "Invalid or expired discount code");
        }
    }

    #[test]
    fn test_below_minimum_names_the_amount() {
        let api: ApiError = DiscountError::BelowMinimum { min: Decimal::new(100, 0) }.into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            api.public_message(),
            "A minimum purchase of 100 is required to use this discount"
        );
    }

    #[test]
    fn test_store_failures_stay_generic() {
        let api = ApiError::Store(sqlx::Error::PoolTimedOut);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.public_message(), "Something went wrong");
    }
}
