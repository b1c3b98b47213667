use super::{LifecycleError, OrderLifecycle};
use crate::entities::{Claim, DeadLetter, Order};
use crate::idempotency::idempotency_key;
use crate::providers::CaptureStatus;
use crate::storage::OrderPatch;
use crate::webhooks::{PaymentOutcome, parse_event};
use kanau::processor::Processor;
use nftvault_sdk::objects::{OrderStatus, ProviderKind};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// A raw webhook request for `provider`.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    pub provider: ProviderKind,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// What happened to an authentic webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied(PaymentConfirmation),
    /// An event type the lifecycle does not act on.
    Ignored,
    /// Could not be applied and never will be; stored for inspection.
    DeadLettered(Uuid),
}

/// `pending → paid` for one order, as reported by `provider`.
#[derive(Debug, Clone)]
pub struct ConfirmPayment {
    pub provider: ProviderKind,
    pub order_id: Uuid,
    pub payment_id: Option<String>,
}

/// `pending → failed` for one order, as reported by `provider`.
#[derive(Debug, Clone)]
pub struct FailPayment {
    pub provider: ProviderKind,
    pub order_id: Uuid,
    pub payment_id: Option<String>,
}

/// Collect a payment the buyer approved, then settle the order by the
/// capture's result.
#[derive(Debug, Clone)]
pub struct CapturePayment {
    pub provider: ProviderKind,
    pub order_id: Uuid,
    /// The provider's id of the approved payment.
    pub payment_id: Option<String>,
}

/// Result of a payment transition. Cached by the idempotency guard and
/// returned verbatim to duplicate deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub order_id: Uuid,
    pub provider: ProviderKind,
    pub status: OrderStatus,
    /// The claim created for a wallet-less order.
    pub claim_id: Option<Uuid>,
}

impl Processor<WebhookDelivery> for OrderLifecycle {
    type Output = WebhookOutcome;
    type Error = LifecycleError;

    #[tracing::instrument(skip_all, err, name = "Lifecycle:WebhookDelivery", fields(provider = %input.provider))]
    async fn process(&self, input: WebhookDelivery) -> Result<WebhookOutcome, LifecycleError> {
        let WebhookDelivery {
            provider,
            headers,
            body,
        } = input;
        self.verifier.verify(provider, &headers, &body).await?;

        let event = match parse_event(provider, &body) {
            Ok(Some(event)) => event,
            Ok(None) => return Ok(WebhookOutcome::Ignored),
            Err(e) => return self.dead_letter(provider, e.to_string(), &body).await,
        };

        let applied = match event.outcome {
            PaymentOutcome::Completed => self
                .process(ConfirmPayment {
                    provider,
                    order_id: event.order_id,
                    payment_id: event.payment_id,
                })
                .await
                .map(Some),
            PaymentOutcome::Failed => self
                .process(FailPayment {
                    provider,
                    order_id: event.order_id,
                    payment_id: event.payment_id,
                })
                .await
                .map(Some),
            PaymentOutcome::Approved => {
                self.process(CapturePayment {
                    provider,
                    order_id: event.order_id,
                    payment_id: event.payment_id,
                })
                .await
            }
        };

        match applied {
            Ok(Some(confirmation)) => Ok(WebhookOutcome::Applied(confirmation)),
            Ok(None) => Ok(WebhookOutcome::Ignored),
            Err(e) if e.is_permanent_for_webhook() => {
                let reason = format!("{} for order {}: {e}", event.event_type, event.order_id);
                self.dead_letter(provider, reason, &body).await
            }
            Err(e) => Err(e),
        }
    }
}

impl OrderLifecycle {
    async fn dead_letter(
        &self,
        provider: ProviderKind,
        reason: String,
        body: &[u8],
    ) -> Result<WebhookOutcome, LifecycleError> {
        warn!(provider = %provider, reason = %reason, "Dead-lettering webhook");
        let letter = DeadLetter::new(provider, reason, body, nftvault_sdk::now_millis());
        self.repository.store_dead_letter(&letter).await?;
        Ok(WebhookOutcome::DeadLettered(letter.id))
    }

    /// Create the claim of a paid wallet-less order whose claim was never
    /// stored. Returns the new claim's id, or `None` if nothing was missing.
    async fn restore_missing_claim(
        &self,
        order: &Order,
        now: i64,
    ) -> Result<Option<Uuid>, LifecycleError> {
        let Some(token) = &order.claim_token else {
            return Ok(None);
        };
        if self.repository.get_claim_by_token(token).await?.is_some() {
            return Ok(None);
        }
        let claim = Claim::new(order.id, token.clone(), now);
        self.repository.store_claim(&claim).await?;
        warn!(order_id = %order.id, claim_id = %claim.id, "Restored missing claim of paid order");
        Ok(Some(claim.id))
    }

    /// Move a pending order to `next`, creating its claim when it is paid.
    async fn settle_payment(
        &self,
        provider: ProviderKind,
        order_id: Uuid,
        payment_id: Option<String>,
        next: OrderStatus,
        now: i64,
    ) -> Result<PaymentConfirmation, LifecycleError> {
        let order = self
            .repository
            .get_order(order_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("order {order_id}")))?;
        if order.status != OrderStatus::Pending {
            // A retry after the claim write failed finds the order paid.
            let restored = if next == OrderStatus::Paid && order.status == OrderStatus::Paid {
                self.restore_missing_claim(&order, now).await?
            } else {
                None
            };
            if restored.is_some() {
                return Ok(PaymentConfirmation {
                    order_id,
                    provider,
                    status: next,
                    claim_id: restored,
                });
            }
            return Err(LifecycleError::Conflict(format!(
                "order {order_id} is {}, expected pending",
                order.status
            )));
        }
        // A session abandoned in favour of the fallback provider may still
        // report failure; only the current provider can fail the order.
        if next == OrderStatus::Failed && order.payment_provider != Some(provider) {
            return Err(LifecycleError::Conflict(format!(
                "order {order_id} is no longer checked out with {provider}"
            )));
        }

        let order = self
            .repository
            .update_order(
                order_id,
                OrderPatch {
                    status: Some(next),
                    payment_provider: Some(provider),
                    payment_id,
                    ..Default::default()
                },
                now,
            )
            .await?;

        let claim_id = match (&order.claim_token, next) {
            (Some(token), OrderStatus::Paid) => {
                let claim = Claim::new(order_id, token.clone(), now);
                self.repository.store_claim(&claim).await?;
                Some(claim.id)
            }
            _ => None,
        };
        info!(order_id = %order_id, provider = %provider, status = %next, "Payment settled");

        Ok(PaymentConfirmation {
            order_id,
            provider,
            status: next,
            claim_id,
        })
    }
}

impl Processor<ConfirmPayment> for OrderLifecycle {
    type Output = PaymentConfirmation;
    type Error = LifecycleError;

    #[tracing::instrument(skip_all, err, name = "Lifecycle:ConfirmPayment", fields(order_id = %input.order_id))]
    async fn process(&self, input: ConfirmPayment) -> Result<PaymentConfirmation, LifecycleError> {
        let key = idempotency_key(
            &format!("{}_payment_completed", input.provider),
            input.order_id,
        );
        self.run_once(key, |now| {
            self.settle_payment(
                input.provider,
                input.order_id,
                input.payment_id,
                OrderStatus::Paid,
                now,
            )
        })
        .await
    }
}

impl Processor<FailPayment> for OrderLifecycle {
    type Output = PaymentConfirmation;
    type Error = LifecycleError;

    #[tracing::instrument(skip_all, err, name = "Lifecycle:FailPayment", fields(order_id = %input.order_id))]
    async fn process(&self, input: FailPayment) -> Result<PaymentConfirmation, LifecycleError> {
        let key = idempotency_key(
            &format!("{}_payment_failed", input.provider),
            input.order_id,
        );
        self.run_once(key, |now| {
            self.settle_payment(
                input.provider,
                input.order_id,
                input.payment_id,
                OrderStatus::Failed,
                now,
            )
        })
        .await
    }
}

impl Processor<CapturePayment> for OrderLifecycle {
    /// `None` while the capture is pending or when there is nothing to collect.
    type Output = Option<PaymentConfirmation>;
    type Error = LifecycleError;

    #[tracing::instrument(skip_all, err, name = "Lifecycle:CapturePayment", fields(order_id = %input.order_id))]
    async fn process(
        &self,
        input: CapturePayment,
    ) -> Result<Option<PaymentConfirmation>, LifecycleError> {
        let CapturePayment {
            provider,
            order_id,
            payment_id,
        } = input;
        let payment_id = payment_id.ok_or_else(|| {
            LifecycleError::Validation(format!("approval for order {order_id} has no payment id"))
        })?;
        let order = self
            .repository
            .get_order(order_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("order {order_id}")))?;
        // Settled orders keep the buyer's approval uncollected.
        if order.status != OrderStatus::Pending {
            info!(order_id = %order_id, status = %order.status, "Skipping capture of settled order");
            return Ok(None);
        }

        match self.providers.get(provider)?.capture(&payment_id).await? {
            CaptureStatus::Completed => self
                .process(ConfirmPayment {
                    provider,
                    order_id,
                    payment_id: Some(payment_id),
                })
                .await
                .map(Some),
            CaptureStatus::Pending => {
                info!(order_id = %order_id, provider = %provider, "Capture pending");
                Ok(None)
            }
            CaptureStatus::Declined => self
                .process(FailPayment {
                    provider,
                    order_id,
                    payment_id: Some(payment_id),
                })
                .await
                .map(Some),
        }
    }
}
