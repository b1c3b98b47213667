use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use kanau::processor::Processor;
use nftvault_core::lifecycle::{CreateOrder, GetOrder, RetryCheckout};
use nftvault_sdk::objects::{CreateOrderRequest, RetryCheckoutRequest};
use uuid::Uuid;

use super::error::ApiError;
use crate::state::AppState;

/// `POST /orders`: open an order and start its checkout.
///
/// Answers `201` with the payment URL, plus a claim token when no wallet
/// was given.
pub(super) async fn create_order(
    state: State<AppState>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    let response = state
        .lifecycle
        .process(CreateOrder {
            wallet_address: request.wallet_address,
            payment_provider: request.payment_provider,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /orders/{order_id}/checkout`: the single fallback checkout.
pub(super) async fn retry_checkout(
    state: State<AppState>,
    Path(order_id): Path<Uuid>,
    body: Result<Json<RetryCheckoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    let response = state
        .lifecycle
        .process(RetryCheckout {
            order_id,
            payment_provider: request.payment_provider,
        })
        .await?;
    Ok(Json(response))
}

/// `GET /orders/{order_id}`: poll order status.
pub(super) async fn get_order(
    state: State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.lifecycle.process(GetOrder { order_id }).await?;
    Ok(Json(order))
}
