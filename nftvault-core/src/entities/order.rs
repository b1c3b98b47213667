use nftvault_sdk::objects::{OrderResponse, OrderStatus, ProviderKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One purchase attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub wallet_address: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub status: OrderStatus,
    pub payment_provider: Option<ProviderKind>,
    /// The provider's own session / charge / order id.
    pub payment_id: Option<String>,
    /// How many providers a checkout was started with (at most 2).
    #[serde(default)]
    pub checkout_attempts: u8,
    pub claim_token: Option<String>,
    /// Unix milliseconds.
    pub claim_token_expiry: Option<i64>,
    pub mint_tx_hash: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
    /// Unix milliseconds, refreshed on every mutation.
    pub updated_at: i64,
}

/// Fields fixed when an order is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub wallet_address: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub payment_provider: ProviderKind,
}

impl Order {
    /// A fresh `pending` order with a new v4 id.
    pub fn new(new: NewOrder, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_address: new.wallet_address,
            amount: new.amount,
            currency: new.currency,
            description: new.description,
            status: OrderStatus::Pending,
            payment_provider: Some(new.payment_provider),
            payment_id: None,
            checkout_attempts: 0,
            claim_token: None,
            claim_token_expiry: None,
            mint_tx_hash: None,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    pub fn to_response(&self) -> OrderResponse {
        OrderResponse {
            order_id: self.id,
            status: self.status,
            amount: self.amount,
            currency: self.currency.clone(),
            wallet_address: self.wallet_address.clone(),
            payment_provider: self.payment_provider,
            mint_tx_hash: self.mint_tx_hash.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
