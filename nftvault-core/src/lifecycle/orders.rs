use super::{LifecycleError, OrderLifecycle, validate_identifier};
use crate::entities::DeadLetter;
use crate::entities::order::{NewOrder, Order};
use crate::storage::OrderPatch;
use kanau::processor::Processor;
use nftvault_sdk::objects::{
    CheckoutResponse, CreateOrderResponse, OrderResponse, OrderStatus, ProviderKind,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Open a new order and start its checkout.
#[derive(Debug, Clone, Default)]
pub struct CreateOrder {
    pub wallet_address: Option<String>,
    pub payment_provider: Option<ProviderKind>,
}

/// Start the single fallback checkout of a pending order with another
/// provider.
#[derive(Debug, Clone)]
pub struct RetryCheckout {
    pub order_id: Uuid,
    pub payment_provider: ProviderKind,
}

#[derive(Debug, Clone, Copy)]
pub struct GetOrder {
    pub order_id: Uuid,
}

/// Newest orders first.
#[derive(Debug, Clone, Copy)]
pub struct ListRecentOrders {
    pub limit: usize,
}

/// Newest parked webhooks first.
#[derive(Debug, Clone, Copy)]
pub struct ListDeadLetters {
    pub limit: usize,
}

impl Processor<CreateOrder> for OrderLifecycle {
    type Output = CreateOrderResponse;
    type Error = LifecycleError;

    #[tracing::instrument(skip_all, err, name = "Lifecycle:CreateOrder")]
    async fn process(&self, input: CreateOrder) -> Result<CreateOrderResponse, LifecycleError> {
        let wallet_address = input
            .wallet_address
            .filter(|wallet| !wallet.trim().is_empty())
            .map(|wallet| validate_identifier("walletAddress", &wallet))
            .transpose()?;
        let kind = self.providers.resolve(input.payment_provider);
        let provider = self.providers.get(kind)?;

        let now = nftvault_sdk::now_millis();
        let mut order = Order::new(
            NewOrder {
                wallet_address: wallet_address.clone(),
                amount: self.checkout.amount,
                currency: self.checkout.currency.clone(),
                description: self.checkout.description.clone(),
                payment_provider: kind,
            },
            now,
        );
        order.checkout_attempts = 1;
        if wallet_address.is_none() {
            let issued = self.tokens.issue_claim(order.id, None)?;
            order.claim_token = Some(issued.token);
            order.claim_token_expiry = Some(issued.expires_at);
        }
        self.repository.store_order(&order).await?;
        info!(order_id = %order.id, provider = %kind, "Order created");

        let session = match provider.create_checkout(&order).await {
            Ok(session) => session,
            Err(source) => {
                warn!(order_id = %order.id, provider = %kind, error = %source, "Checkout failed");
                return Err(LifecycleError::Checkout {
                    order_id: order.id,
                    claim_token: order.claim_token,
                    source,
                });
            }
        };

        self.repository
            .update_order(
                order.id,
                OrderPatch {
                    payment_id: Some(session.provider_charge_id),
                    ..Default::default()
                },
                nftvault_sdk::now_millis(),
            )
            .await?;

        Ok(CreateOrderResponse {
            order_id: order.id,
            payment_url: session.redirect_url,
            claim_token: order.claim_token,
        })
    }
}

impl Processor<RetryCheckout> for OrderLifecycle {
    type Output = CheckoutResponse;
    type Error = LifecycleError;

    #[tracing::instrument(skip_all, err, name = "Lifecycle:RetryCheckout", fields(order_id = %input.order_id))]
    async fn process(&self, input: RetryCheckout) -> Result<CheckoutResponse, LifecycleError> {
        let order = self
            .repository
            .get_order(input.order_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("order {}", input.order_id)))?;

        if order.status != OrderStatus::Pending {
            return Err(LifecycleError::Conflict(format!(
                "order {} is {}, expected pending",
                order.id, order.status
            )));
        }
        if order.payment_provider == Some(input.payment_provider) {
            return Err(LifecycleError::Conflict(format!(
                "order {} was already checked out with {}",
                order.id, input.payment_provider
            )));
        }
        if order.checkout_attempts >= 2 {
            return Err(LifecycleError::Conflict(format!(
                "order {} has used its fallback checkout",
                order.id
            )));
        }
        let provider = self.providers.get(input.payment_provider)?;

        // Burn the fallback before calling out so a failure cannot be retried.
        // The swap fails if another request changed the order after the
        // checks above, which keeps the limit at one fallback.
        let order_id = order.id;
        let order = self
            .repository
            .swap_order(
                &order,
                OrderPatch {
                    payment_provider: Some(input.payment_provider),
                    checkout_attempts: Some(order.checkout_attempts.saturating_add(1)),
                    ..Default::default()
                },
                nftvault_sdk::now_millis(),
            )
            .await?
            .ok_or_else(|| {
                LifecycleError::Conflict(format!(
                    "order {order_id} changed during the fallback checkout"
                ))
            })?;

        let session = match provider.create_checkout(&order).await {
            Ok(session) => session,
            Err(source) => {
                warn!(order_id = %order.id, provider = %input.payment_provider, error = %source, "Fallback checkout failed");
                return Err(LifecycleError::Checkout {
                    order_id: order.id,
                    claim_token: order.claim_token,
                    source,
                });
            }
        };

        self.repository
            .update_order(
                order.id,
                OrderPatch {
                    payment_id: Some(session.provider_charge_id),
                    ..Default::default()
                },
                nftvault_sdk::now_millis(),
            )
            .await?;
        info!(order_id = %order.id, provider = %input.payment_provider, "Fallback checkout started");

        Ok(CheckoutResponse {
            order_id: order.id,
            payment_url: session.redirect_url,
            claim_token: order.claim_token,
        })
    }
}

impl Processor<GetOrder> for OrderLifecycle {
    type Output = OrderResponse;
    type Error = LifecycleError;

    async fn process(&self, input: GetOrder) -> Result<OrderResponse, LifecycleError> {
        self.repository
            .get_order(input.order_id)
            .await?
            .map(|order| order.to_response())
            .ok_or_else(|| LifecycleError::NotFound(format!("order {}", input.order_id)))
    }
}

impl Processor<ListRecentOrders> for OrderLifecycle {
    type Output = Vec<OrderResponse>;
    type Error = LifecycleError;

    async fn process(&self, input: ListRecentOrders) -> Result<Vec<OrderResponse>, LifecycleError> {
        let orders = self.repository.get_recent_orders(input.limit).await?;
        Ok(orders.iter().map(Order::to_response).collect())
    }
}

impl Processor<ListDeadLetters> for OrderLifecycle {
    type Output = Vec<DeadLetter>;
    type Error = LifecycleError;

    async fn process(&self, input: ListDeadLetters) -> Result<Vec<DeadLetter>, LifecycleError> {
        Ok(self.repository.recent_dead_letters(input.limit).await?)
    }
}
