//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `POST /orders`                     – create an order and start checkout
//! - `POST /orders/{order_id}/checkout` – fallback checkout with another provider
//! - `GET  /orders/{order_id}`          – order status
//! - `POST /webhooks/{provider}`        – payment provider notifications
//! - `GET  /claim?token=…`              – inspect a claim token
//! - `POST /claim`                      – redeem a claim for a mint signature
//! - `POST /mint`                       – confirm the on-chain mint
//! - `GET  /admin/orders`               – recent orders (admin)
//! - `GET  /admin/dead-letters`         – parked webhooks (admin)

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

mod admin;
mod claim;
pub(crate) mod error;
pub(crate) mod extractors;
mod orders;
mod webhooks;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(orders::create_order))
        .route("/orders/{order_id}", get(orders::get_order))
        .route("/orders/{order_id}/checkout", post(orders::retry_checkout))
        .route("/webhooks/{provider}", post(webhooks::receive_webhook))
        .route("/claim", get(claim::inspect_claim).post(claim::redeem_claim))
        .route("/mint", post(claim::confirm_mint))
        .nest("/admin", admin_router())
}

fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(admin::list_orders))
        .route("/dead-letters", get(admin::list_dead_letters))
}
