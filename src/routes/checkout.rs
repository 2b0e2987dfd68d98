//! Storefront checkout endpoints
//!
//! Discount validation is free to call repeatedly; the usage counter only
//! moves inside `checkout`, after the order has committed. Payment capture
//! itself happens upstream of this service.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::audit::AuditRecord;
use crate::domain::discount::{AppliedDiscount, DiscountError};
use crate::error::ApiError;
use crate::ledger::LedgerError;
use crate::AppState;

const MAX_LINE_QUANTITY: u32 = 1_000_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateDiscountRequest {
    pub code: String,
    pub cart_total: Decimal,
}

pub async fn validate_discount(
    State(state): State<AppState>,
    Json(req): Json<ValidateDiscountRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.code.trim().is_empty() {
        return Err(ApiError::InvalidInput("discount code is required".into()));
    }
    if req.cart_total < Decimal::ZERO {
        return Err(ApiError::InvalidInput("cartTotal must be non-negative".into()));
    }
    let applied = state
        .ledger
        .validate(&req.code, req.cart_total, Utc::now())
        .await?;
    Ok(Json(serde_json::json!({ "success": true, "discount": applied })))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(email(message = "customerEmail must be a valid email address"))]
    pub customer_email: String,
    pub items: Vec<CheckoutItem>,
    pub discount_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub order: OrderSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub total: Decimal,
    pub discount_applied: bool,
}

/// How a redemption attempt resolves for an order that has already
/// committed. A failed redemption never fails the order; it strips the
/// discount from it instead, so a limited code is never oversold and a
/// use is never consumed without an order to show for it.
#[derive(Debug, PartialEq)]
enum Settlement {
    Kept,
    Stripped { limit_reached: bool },
}

fn settle_redemption(outcome: &Result<AppliedDiscount, LedgerError>) -> Settlement {
    match outcome {
        Ok(_) => Settlement::Kept,
        Err(LedgerError::Rejected(DiscountError::LimitReached)) => {
            Settlement::Stripped { limit_reached: true }
        }
        Err(LedgerError::Rejected(_)) => Settlement::Stripped { limit_reached: false },
        Err(LedgerError::Store(e)) => {
            tracing::error!(error = %e, "discount redemption failed after order commit");
            Settlement::Stripped { limit_reached: false }
        }
    }
}

pub async fn checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    req.validate()
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
    if req.items.is_empty() {
        return Err(ApiError::InvalidInput("order must contain at least one item".into()));
    }
    for item in &req.items {
        if item.quantity == 0 {
            return Err(ApiError::InvalidInput("item quantity must be positive".into()));
        }
        if item.quantity > MAX_LINE_QUANTITY {
            return Err(ApiError::InvalidInput("item quantity is too large".into()));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(ApiError::InvalidInput("item unitPrice must be non-negative".into()));
        }
    }

    let subtotal: Decimal = req
        .items
        .iter()
        .map(|i| i.unit_price * Decimal::from(i.quantity))
        .sum::<Decimal>()
        .round_dp(2);

    // Check the code against this cart up front so a stale or undersized
    // cart is rejected with the same messages as the validate endpoint.
    // The usage counter does not move here.
    let mut validated = None;
    if let Some(code) = req.discount_code.as_deref() {
        validated = Some(state.ledger.validate(code, subtotal, Utc::now()).await?);
    }
    let mut discount_total = validated
        .as_ref()
        .map(|a| a.amount_off(subtotal))
        .unwrap_or(Decimal::ZERO);
    let mut total = subtotal - discount_total;
    let mut applied_code = validated.as_ref().map(|a| a.code.clone());

    let order_id = Uuid::now_v7();
    let order_number = format!("ORD-{:08}", rand::random::<u32>());
    let mut tx = state.db.begin().await?;
    sqlx::query(
        "INSERT INTO orders (id, order_number, customer_email, status, subtotal, \
         discount_code, discount_total, total, payment_status, created_at, updated_at) \
         VALUES ($1, $2, $3, 'confirmed', $4, $5, $6, $7, 'paid', NOW(), NOW())",
    )
    .bind(order_id)
    .bind(&order_number)
    .bind(&req.customer_email)
    .bind(subtotal)
    .bind(&applied_code)
    .bind(discount_total)
    .bind(total)
    .execute(&mut *tx)
    .await?;
    for item in &req.items {
        let line_total = (item.unit_price * Decimal::from(item.quantity)).round_dp(2);
        sqlx::query(
            "INSERT INTO order_items (id, order_id, name, sku, quantity, unit_price, total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::now_v7())
        .bind(order_id)
        .bind(&item.name)
        .bind(&item.sku)
        .bind(item.quantity as i32)
        .bind(item.unit_price)
        .bind(line_total)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    // The order is committed; only now is a use consumed. Ordering matters:
    // redeeming first would leak a use of a limited code if the insert
    // failed, and the counter is monotonic so there is no refund path.
    if let Some(applied) = &validated {
        let outcome = state.ledger.redeem(&applied.code).await;
        if let Settlement::Stripped { limit_reached } = settle_redemption(&outcome) {
            sqlx::query(
                "UPDATE orders SET discount_code = NULL, discount_total = 0, \
                 total = subtotal, updated_at = NOW() WHERE id = $1",
            )
            .bind(order_id)
            .execute(&state.db)
            .await?;
            discount_total = Decimal::ZERO;
            total = subtotal;
            applied_code = None;
            if limit_reached {
                state.events.notify_admins(
                    "discount_limit_reached",
                    serde_json::json!({ "code": applied.code }),
                );
            }
        }
    }

    let discount_applied = applied_code.is_some();
    state.events.audit(
        AuditRecord::new("order", "placed")
            .target(order_id.to_string())
            .metadata(serde_json::json!({
                "orderNumber": order_number,
                "total": total,
                "discountCode": applied_code,
            })),
    );

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            success: true,
            order: OrderSummary {
                id: order_id,
                order_number,
                subtotal,
                discount_total,
                total,
                discount_applied,
            },
        }),
    ))
}
