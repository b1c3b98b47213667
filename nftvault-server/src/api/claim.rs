use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::IntoResponse,
};
use kanau::processor::Processor;
use nftvault_core::lifecycle::{ConfirmMint, InspectClaim, RedeemClaim};
use nftvault_sdk::objects::{MintRequest, RedeemClaimRequest};
use serde::Deserialize;

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct ClaimQuery {
    token: String,
}

/// `GET /claim?token=…`: what the claim token is for.
pub(super) async fn inspect_claim(
    state: State<AppState>,
    query: Result<Query<ClaimQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let summary = state
        .lifecycle
        .process(InspectClaim { token: query.token })
        .await?;
    Ok(Json(summary))
}

/// `POST /claim`: redeem a claim for a mint signature.
pub(super) async fn redeem_claim(
    state: State<AppState>,
    body: Result<Json<RedeemClaimRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    let response = state
        .lifecycle
        .process(RedeemClaim {
            token: request.token,
            wallet_address: request.wallet_address,
            tx_hash: request.tx_hash,
        })
        .await?;
    Ok(Json(response))
}

/// `POST /mint`: record the on-chain mint of a paid order.
pub(super) async fn confirm_mint(
    state: State<AppState>,
    body: Result<Json<MintRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    let order = state
        .lifecycle
        .process(ConfirmMint {
            order_id: request.order_id,
            wallet_address: request.wallet_address,
            tx_hash: request.tx_hash,
        })
        .await?;
    Ok(Json(order))
}
