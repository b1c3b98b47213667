use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderStatus, ProviderKind};

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Absent when the buyer has no wallet yet; a claim token is issued instead.
    #[serde(default)]
    pub wallet_address: Option<String>,
    /// Overrides the configured default provider.
    #[serde(default)]
    pub payment_provider: Option<ProviderKind>,
}

/// Response of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub payment_url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub claim_token: Option<String>,
}

/// Body of `POST /orders/{order_id}/checkout`, the single fallback attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryCheckoutRequest {
    pub payment_provider: ProviderKind,
}

/// Response of `POST /orders/{order_id}/checkout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub payment_url: String,
    /// Repeated from order creation so a buyer who lost it can still claim.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub claim_token: Option<String>,
}

/// Public view of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub amount: Decimal,
    pub currency: String,
    pub wallet_address: Option<String>,
    pub payment_provider: Option<ProviderKind>,
    pub mint_tx_hash: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
    /// Unix milliseconds.
    pub updated_at: i64,
}
