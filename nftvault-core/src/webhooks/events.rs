use super::WebhookError;
use nftvault_sdk::objects::ProviderKind;
use serde_json::Value;
use uuid::Uuid;

/// What a verified webhook says happened to a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Completed,
    Failed,
    /// The buyer approved the payment; funds move only once it is captured.
    Approved,
}

/// A provider event reduced to what the lifecycle acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    pub provider: ProviderKind,
    pub outcome: PaymentOutcome,
    pub order_id: Uuid,
    /// The provider's id of the paid object, if the event carries one.
    pub payment_id: Option<String>,
    pub event_type: String,
}

/// Parse a verified webhook body.
///
/// Returns `Ok(None)` for event types the lifecycle ignores. A body that is
/// not JSON, or a relevant event without a usable order id, is
/// [`WebhookError::Malformed`].
pub fn parse_event(
    provider: ProviderKind,
    raw_body: &[u8],
) -> Result<Option<PaymentEvent>, WebhookError> {
    let malformed = |reason: &str| WebhookError::Malformed {
        provider,
        reason: reason.to_owned(),
    };
    let body: Value = serde_json::from_slice(raw_body).map_err(|e| malformed(&e.to_string()))?;

    let (event_type, object, order_ref) = match provider {
        ProviderKind::Stripe => {
            let object = &body["data"]["object"];
            let order_ref = object["metadata"]["orderId"]
                .as_str()
                .or_else(|| object["client_reference_id"].as_str());
            (&body["type"], object, order_ref)
        }
        ProviderKind::Coinbase => {
            let object = &body["event"]["data"];
            (&body["event"]["type"], object, object["metadata"]["orderId"].as_str())
        }
        ProviderKind::Paypal => {
            let object = &body["resource"];
            let order_ref = object["custom_id"]
                .as_str()
                .or_else(|| object["purchase_units"][0]["custom_id"].as_str());
            (&body["event_type"], object, order_ref)
        }
    };

    let event_type = event_type
        .as_str()
        .ok_or_else(|| malformed("missing event type"))?;
    let Some(outcome) = classify(provider, event_type) else {
        tracing::debug!(provider = %provider, event_type, "Ignoring webhook event");
        return Ok(None);
    };
    // Delayed payment methods complete the session before the money arrives.
    if provider == ProviderKind::Stripe
        && event_type == "checkout.session.completed"
        && object["payment_status"].as_str() != Some("paid")
    {
        tracing::debug!(
            event_type,
            payment_status = object["payment_status"].as_str().unwrap_or("missing"),
            "Ignoring unpaid checkout session"
        );
        return Ok(None);
    }

    let order_id = order_ref
        .ok_or_else(|| malformed("missing order reference"))?
        .parse::<Uuid>()
        .map_err(|_| malformed("order reference is not a UUID"))?;

    Ok(Some(PaymentEvent {
        provider,
        outcome,
        order_id,
        payment_id: object["id"].as_str().map(str::to_owned),
        event_type: event_type.to_owned(),
    }))
}

fn classify(provider: ProviderKind, event_type: &str) -> Option<PaymentOutcome> {
    use PaymentOutcome::*;
    match (provider, event_type) {
        (
            ProviderKind::Stripe,
            "checkout.session.completed" | "checkout.session.async_payment_succeeded",
        ) => Some(Completed),
        (
            ProviderKind::Stripe,
            "checkout.session.expired" | "checkout.session.async_payment_failed",
        ) => Some(Failed),
        (ProviderKind::Coinbase, "charge:confirmed" | "charge:resolved") => Some(Completed),
        (ProviderKind::Coinbase, "charge:failed") => Some(Failed),
        (ProviderKind::Paypal, "CHECKOUT.ORDER.APPROVED") => Some(Approved),
        (ProviderKind::Paypal, "PAYMENT.CAPTURE.COMPLETED") => Some(Completed),
        (ProviderKind::Paypal, "PAYMENT.CAPTURE.DENIED") => Some(Failed),
        _ => None,
    }
}
