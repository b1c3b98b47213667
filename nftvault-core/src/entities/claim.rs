use nftvault_sdk::objects::ClaimStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The right to redeem one paid order exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: Uuid,
    pub order_id: Uuid,
    pub token: String,
    pub status: ClaimStatus,
    /// Unix milliseconds.
    pub created_at: i64,
    /// Unix milliseconds.
    pub consumed_at: Option<i64>,
    pub mint_signature: Option<String>,
    /// Wallet the claim was redeemed to.
    #[serde(default)]
    pub wallet_address: Option<String>,
}

impl Claim {
    /// A new `active` claim for `order_id`.
    pub fn new(order_id: Uuid, token: String, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            token,
            status: ClaimStatus::Active,
            created_at: now_ms,
            consumed_at: None,
            mint_signature: None,
            wallet_address: None,
        }
    }

    /// The consumed form of this claim. Does not touch storage.
    pub fn consumed(&self, now_ms: i64, mint_signature: String, wallet_address: String) -> Self {
        Self {
            status: ClaimStatus::Consumed,
            consumed_at: Some(now_ms),
            mint_signature: Some(mint_signature),
            wallet_address: Some(wallet_address),
            ..self.clone()
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ClaimStatus::Active
    }
}
