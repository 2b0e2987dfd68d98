//! Commerce API
//!
//! Storefront checkout and back-office service for a retail shop.
//!
//! ## Features
//! - Discount code validation against cart contents
//! - Atomic redemption bookkeeping (usage limits hold under concurrent checkout)
//! - Back-office discount administration with staff role checks
//! - Order placement at checkout
//! - Best-effort audit records and admin alerts over NATS

pub mod audit;
pub mod auth;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod routes;

use crate::audit::EventSink;
use crate::ledger::{Ledger, PgDiscountStore};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub ledger: Ledger<PgDiscountStore>,
    pub events: EventSink,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, nats: Option<async_nats::Client>) -> Self {
        Self {
            ledger: Ledger::new(PgDiscountStore::new(db.clone())),
            events: EventSink::new(nats),
            db,
        }
    }
}
