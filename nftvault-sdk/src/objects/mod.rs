//! Request and response bodies of the vault HTTP API.
//!
//! All bodies are camelCase JSON.

pub mod admin;
pub mod claim;
pub mod order;
pub mod webhook;

pub use admin::{AdminOrderList, DeadLetterList, DeadLetterResponse, ListQuery};
pub use claim::{ClaimSummary, MintRequest, RedeemClaimRequest, RedeemClaimResponse};
pub use order::{
    CheckoutResponse, CreateOrderRequest, CreateOrderResponse, OrderResponse,
    RetryCheckoutRequest,
};
pub use webhook::WebhookAck;

use serde::{Deserialize, Serialize};

/// The checkout backends an order can be paid through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Stripe,
    Coinbase,
    Paypal,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Stripe,
        ProviderKind::Coinbase,
        ProviderKind::Paypal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Stripe => "stripe",
            ProviderKind::Coinbase => "coinbase",
            ProviderKind::Paypal => "paypal",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stripe" => Ok(ProviderKind::Stripe),
            "coinbase" => Ok(ProviderKind::Coinbase),
            "paypal" => Ok(ProviderKind::Paypal),
            _ => Err(UnknownProvider(s.to_owned())),
        }
    }
}

/// Returned when a provider name does not match any [`ProviderKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown payment provider: {0}")]
pub struct UnknownProvider(pub String);

/// Order status.
///
/// Statuses only move forward: `pending → paid → minted`, or
/// `pending → failed`. `completed` is an alternate terminal label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Minted,
    Completed,
    Failed,
}

impl OrderStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Minted | OrderStatus::Completed | OrderStatus::Failed
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Failed)
                | (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Paid, OrderStatus::Minted)
                | (OrderStatus::Paid, OrderStatus::Completed)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Paid => write!(f, "paid"),
            OrderStatus::Minted => write!(f, "minted"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Claim status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Active,
    Consumed,
}

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "orderId", skip_serializing_if = "Option::is_none", default)]
    pub order_id: Option<uuid::Uuid>,
    /// Set when order creation stored the order but its checkout failed.
    #[serde(rename = "claimToken", skip_serializing_if = "Option::is_none", default)]
    pub claim_token: Option<String>,
}
