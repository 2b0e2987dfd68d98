//! HTTP surface

pub mod admin;
pub mod checkout;

use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/checkout/validate-discount", post(checkout::validate_discount))
        .route("/checkout", post(checkout::checkout))
        .route(
            "/admin/discounts",
            get(admin::list_discounts).post(admin::create_discount),
        )
        .route(
            "/admin/discounts/:id",
            patch(admin::update_discount_status).delete(admin::delete_discount),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "commerce-api" }))
}
