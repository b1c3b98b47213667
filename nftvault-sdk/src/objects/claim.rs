use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ClaimStatus, OrderResponse};

/// Response of `GET /claim?token=…`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSummary {
    pub order: OrderResponse,
    /// `None` while the payment has not been confirmed yet.
    pub claim_status: Option<ClaimStatus>,
    /// Unix milliseconds.
    pub token_expires_at: i64,
}

/// Body of `POST /claim`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemClaimRequest {
    pub token: String,
    pub wallet_address: String,
    /// When present the mint is confirmed in the same request.
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// Response of `POST /claim`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemClaimResponse {
    pub claim_id: Uuid,
    pub order_id: Uuid,
    pub mint_signature: String,
    /// Unix milliseconds.
    pub mint_signature_expires_at: i64,
    /// Set when a `txHash` was supplied and the mint got confirmed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order: Option<OrderResponse>,
    /// Why the supplied `txHash` was not confirmed. The claim stays redeemed
    /// and the mint can be confirmed again through `POST /mint`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mint_error: Option<String>,
}

/// Body of `POST /mint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub order_id: Uuid,
    pub wallet_address: String,
    pub tx_hash: String,
}
