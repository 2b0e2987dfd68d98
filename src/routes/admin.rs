//! Back-office discount administration
//!
//! All routes require a staff session (owner, admin or manager). Mutations
//! emit best-effort audit records.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::audit::AuditRecord;
use crate::auth::Session;
use crate::domain::discount::{normalize_code, DiscountCode, DiscountKind, DiscountStatus};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscountRequest {
    #[validate(length(min = 3, max = 32, message = "code must be 3-32 characters"))]
    pub code: String,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
    pub min_purchase: Option<Decimal>,
    #[validate(range(min = 1, message = "usageLimit must be positive"))]
    pub usage_limit: Option<i32>,
}

pub async fn create_discount(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CreateDiscountRequest>,
) -> Result<(StatusCode, Json<DiscountCode>), ApiError> {
    session.require_staff()?;
    req.validate()
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
    if req.value <= Decimal::ZERO {
        return Err(ApiError::InvalidInput("value must be positive".into()));
    }
    if req.kind == DiscountKind::Percentage && req.value > Decimal::ONE_HUNDRED {
        return Err(ApiError::InvalidInput("percentage value cannot exceed 100".into()));
    }
    let min_purchase = req.min_purchase.unwrap_or(Decimal::ZERO);
    if min_purchase < Decimal::ZERO {
        return Err(ApiError::InvalidInput("minPurchase cannot be negative".into()));
    }
    let code = normalize_code(&req.code);

    let discount = sqlx::query_as::<_, DiscountCode>(
        "INSERT INTO discount_codes (id, code, kind, value, status, expires_at, \
         min_purchase, usage_limit, used_count, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, 0, NOW(), NOW()) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&code)
    .bind(req.kind)
    .bind(req.value)
    .bind(req.expires_at)
    .bind(min_purchase)
    .bind(req.usage_limit)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return ApiError::DuplicateCode;
            }
        }
        ApiError::Store(e)
    })?;

    state.events.audit(
        AuditRecord::new("discount", "created")
            .actor(session.user_id)
            .target(discount.id.to_string())
            .metadata(serde_json::json!({ "code": discount.code })),
    );
    Ok((StatusCode::CREATED, Json(discount)))
}

pub async fn list_discounts(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<DiscountCode>>, ApiError> {
    session.require_staff()?;
    let discounts = sqlx::query_as::<_, DiscountCode>(
        "SELECT * FROM discount_codes ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(discounts))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDiscountStatusRequest {
    pub status: DiscountStatus,
}

/// Only the status is editable after creation; value and limits stay fixed
/// so already-issued carts keep their terms.
pub async fn update_discount_status(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDiscountStatusRequest>,
) -> Result<Json<DiscountCode>, ApiError> {
    session.require_staff()?;
    let discount = sqlx::query_as::<_, DiscountCode>(
        "UPDATE discount_codes SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(req.status)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("Discount"))?;

    state.events.audit(
        AuditRecord::new("discount", "status_changed")
            .actor(session.user_id)
            .target(discount.id.to_string())
            .metadata(serde_json::json!({ "code": discount.code, "status": discount.status })),
    );
    Ok(Json(discount))
}

pub async fn delete_discount(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    session.require_staff()?;
    let result = sqlx::query("DELETE FROM discount_codes WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Discount"));
    }
    state.events.audit(
        AuditRecord::new("discount", "deleted")
            .actor(session.user_id)
            .target(id.to_string()),
    );
    Ok(StatusCode::NO_CONTENT)
}
