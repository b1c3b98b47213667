//! Admin API handlers.
//!
//! Require the `Vault-Admin-Authorization` header with the plaintext admin
//! secret.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use kanau::processor::Processor;
use nftvault_core::entities::DeadLetter;
use nftvault_core::lifecycle::{ListDeadLetters, ListRecentOrders};
use nftvault_sdk::objects::admin::MAX_LIST_LIMIT;
use nftvault_sdk::objects::{AdminOrderList, DeadLetterList, ListQuery};

use super::error::ApiError;
use super::extractors::AdminAuth;
use crate::state::AppState;

fn clamp(query: &ListQuery) -> usize {
    query.limit.clamp(1, MAX_LIST_LIMIT)
}

/// `GET /admin/orders`: newest orders first.
pub(super) async fn list_orders(
    state: State<AppState>,
    _auth: AdminAuth,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let orders = state
        .lifecycle
        .process(ListRecentOrders {
            limit: clamp(&query),
        })
        .await?;
    Ok(Json(AdminOrderList { orders }))
}

/// `GET /admin/dead-letters`: webhooks that could not be applied.
pub(super) async fn list_dead_letters(
    state: State<AppState>,
    _auth: AdminAuth,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let letters = state
        .lifecycle
        .process(ListDeadLetters {
            limit: clamp(&query),
        })
        .await?;
    Ok(Json(DeadLetterList {
        dead_letters: letters.iter().map(DeadLetter::to_response).collect(),
    }))
}
