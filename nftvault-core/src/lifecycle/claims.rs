use super::{LifecycleError, OrderLifecycle, validate_identifier};
use crate::idempotency::idempotency_key;
use crate::storage::OrderPatch;
use kanau::processor::Processor;
use nftvault_sdk::objects::{ClaimSummary, OrderResponse, OrderStatus, RedeemClaimResponse};
use tracing::{info, warn};
use uuid::Uuid;

/// Look at the order behind a claim token without redeeming it.
#[derive(Debug, Clone)]
pub struct InspectClaim {
    pub token: String,
}

/// Consume a claim and receive a mint signature bound to `wallet_address`.
#[derive(Debug, Clone)]
pub struct RedeemClaim {
    pub token: String,
    pub wallet_address: String,
    /// Confirms the mint in the same call when present.
    pub tx_hash: Option<String>,
}

/// `paid → minted`.
#[derive(Debug, Clone)]
pub struct ConfirmMint {
    pub order_id: Uuid,
    pub wallet_address: String,
    pub tx_hash: String,
}

impl Processor<InspectClaim> for OrderLifecycle {
    type Output = ClaimSummary;
    type Error = LifecycleError;

    async fn process(&self, input: InspectClaim) -> Result<ClaimSummary, LifecycleError> {
        let payload = self.tokens.verify(&input.token)?;
        let order = self
            .repository
            .get_order(payload.order_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("order {}", payload.order_id)))?;
        let claim = self.repository.get_claim_by_token(&input.token).await?;

        Ok(ClaimSummary {
            order: order.to_response(),
            claim_status: claim.map(|claim| claim.status),
            token_expires_at: payload.expires_at,
        })
    }
}

impl Processor<RedeemClaim> for OrderLifecycle {
    type Output = RedeemClaimResponse;
    type Error = LifecycleError;

    #[tracing::instrument(skip_all, err, name = "Lifecycle:RedeemClaim")]
    async fn process(&self, input: RedeemClaim) -> Result<RedeemClaimResponse, LifecycleError> {
        let payload = self.tokens.verify(&input.token)?;
        let wallet_address = validate_identifier("walletAddress", &input.wallet_address)?;
        // Everything that can reject the request runs before the claim is consumed.
        let tx_hash = input
            .tx_hash
            .as_deref()
            .map(|tx_hash| validate_identifier("txHash", tx_hash))
            .transpose()?;

        let claim = self
            .repository
            .get_claim_by_token(&input.token)
            .await?
            .ok_or_else(|| {
                LifecycleError::NotFound(format!(
                    "claim for order {} (payment may not be confirmed yet)",
                    payload.order_id
                ))
            })?;
        if !claim.is_active() {
            return Err(LifecycleError::Gone(format!(
                "claim {} was already redeemed",
                claim.id
            )));
        }
        if claim.order_id != payload.order_id {
            warn!(claim_id = %claim.id, "Claim token bound to another order");
            return Err(LifecycleError::Authentication(
                "claim token does not match its claim".into(),
            ));
        }

        let mint = self
            .tokens
            .issue_mint_signature(claim.order_id, wallet_address.clone())?;
        let consumed = claim.consumed(
            nftvault_sdk::now_millis(),
            mint.token.clone(),
            wallet_address.clone(),
        );
        if !self.repository.consume_claim(&claim, &consumed).await? {
            return Err(LifecycleError::Gone(format!(
                "claim {} was already redeemed",
                claim.id
            )));
        }
        info!(claim_id = %claim.id, order_id = %claim.order_id, "Claim redeemed");

        // The claim is spent; a failed confirmation must not lose the signature.
        let (order, mint_error) = match tx_hash {
            Some(tx_hash) => match self
                .process(ConfirmMint {
                    order_id: claim.order_id,
                    wallet_address,
                    tx_hash,
                })
                .await
            {
                Ok(order) => (Some(order), None),
                Err(e) => {
                    warn!(claim_id = %claim.id, error = %e, "Mint confirmation after redemption failed");
                    (None, Some(e.to_string()))
                }
            },
            None => (None, None),
        };

        Ok(RedeemClaimResponse {
            claim_id: claim.id,
            order_id: claim.order_id,
            mint_signature: mint.token,
            mint_signature_expires_at: mint.expires_at,
            order,
            mint_error,
        })
    }
}

impl Processor<ConfirmMint> for OrderLifecycle {
    type Output = OrderResponse;
    type Error = LifecycleError;

    #[tracing::instrument(skip_all, err, name = "Lifecycle:ConfirmMint", fields(order_id = %input.order_id))]
    async fn process(&self, input: ConfirmMint) -> Result<OrderResponse, LifecycleError> {
        let wallet_address = validate_identifier("walletAddress", &input.wallet_address)?;
        let tx_hash = validate_identifier("txHash", &input.tx_hash)?;
        let order_id = input.order_id;

        self.run_once(idempotency_key("mint_confirmed", order_id), |now| async move {
            let order = self
                .repository
                .get_order(order_id)
                .await?
                .ok_or_else(|| LifecycleError::NotFound(format!("order {order_id}")))?;
            if order.status != OrderStatus::Paid {
                return Err(LifecycleError::Conflict(format!(
                    "order {order_id} is {}, expected paid",
                    order.status
                )));
            }

            // A wallet-less order mints to the wallet its claim was redeemed to.
            if let Some(token) = &order.claim_token {
                let redeemed_to = self
                    .repository
                    .get_claim_by_token(token)
                    .await?
                    .filter(|claim| !claim.is_active())
                    .and_then(|claim| claim.wallet_address);
                if redeemed_to.as_deref() != Some(wallet_address.as_str()) {
                    return Err(LifecycleError::Conflict(format!(
                        "order {order_id} must be claimed by {wallet_address} before minting"
                    )));
                }
            } else if order
                .wallet_address
                .as_deref()
                .is_some_and(|stored| stored != wallet_address)
            {
                warn!(order_id = %order_id, "Mint wallet differs from the ordering wallet");
                return Err(LifecycleError::Conflict(format!(
                    "order {order_id} was placed for another wallet"
                )));
            }

            let order = self
                .repository
                .update_order(
                    order_id,
                    OrderPatch {
                        status: Some(OrderStatus::Minted),
                        wallet_address: Some(wallet_address),
                        mint_tx_hash: Some(tx_hash),
                        ..Default::default()
                    },
                    now,
                )
                .await?;
            info!(order_id = %order_id, "Mint confirmed");
            Ok(order.to_response())
        })
        .await
    }
}
