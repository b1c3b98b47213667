//! Inbound provider webhooks.
//!
//! A delivery is handled in two steps. [`WebhookVerifier::verify`]
//! authenticates the raw body against the provider's signature scheme, and
//! only then is the body parsed into a [`PaymentEvent`] by [`parse_event`].
//! Nothing in a payload is trusted before verification.

mod events;

pub use events::{PaymentEvent, PaymentOutcome, parse_event};

use crate::config::{CoinbaseConfig, StripeConfig, WebhooksConfig};
use crate::providers::{PayPalClient, ProviderError};
use nftvault_sdk::objects::ProviderKind;
use nftvault_sdk::signature::{self, HmacScheme};
use reqwest::header::HeaderMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    /// No credentials to verify this provider's deliveries
    #[error("webhooks for {0} are not configured")]
    NotConfigured(ProviderKind),

    /// Missing or wrong signature
    #[error("invalid {0} webhook signature")]
    InvalidSignature(ProviderKind),

    /// The verification call itself failed
    #[error("webhook verification failed: {0}")]
    Verification(#[from] ProviderError),

    /// Authentic, but not an event we can read
    #[error("malformed {provider} webhook payload: {reason}")]
    Malformed {
        provider: ProviderKind,
        reason: String,
    },
}

/// Per-provider signature verification.
#[derive(Clone, Default)]
pub struct WebhookVerifier {
    stripe_secret: Option<Box<[u8]>>,
    stripe_tolerance: Option<i64>,
    coinbase_secret: Option<Box<[u8]>>,
    paypal: Option<Arc<PayPalClient>>,
}

impl WebhookVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stripe(mut self, config: &StripeConfig, webhooks: WebhooksConfig) -> Self {
        self.stripe_secret = Some(config.webhook_secret.as_bytes().into());
        self.stripe_tolerance = Some(webhooks.stripe_tolerance_secs);
        self
    }

    pub fn with_coinbase(mut self, config: &CoinbaseConfig) -> Self {
        self.coinbase_secret = Some(config.webhook_secret.as_bytes().into());
        self
    }

    pub fn with_paypal(mut self, client: Arc<PayPalClient>) -> Self {
        self.paypal = Some(client);
        self
    }

    /// Authenticate `raw_body` as a delivery from `provider`.
    pub async fn verify(
        &self,
        provider: ProviderKind,
        headers: &HeaderMap,
        raw_body: &[u8],
    ) -> Result<(), WebhookError> {
        let authentic = match provider {
            ProviderKind::Stripe => {
                let secret = self
                    .stripe_secret
                    .as_deref()
                    .ok_or(WebhookError::NotConfigured(provider))?;
                header_str(headers, HmacScheme::Stripe.header_name()).is_some_and(|header| {
                    signature::verify_stripe_signature(
                        raw_body,
                        header,
                        secret,
                        self.stripe_tolerance,
                    )
                })
            }
            ProviderKind::Coinbase => {
                let secret = self
                    .coinbase_secret
                    .as_deref()
                    .ok_or(WebhookError::NotConfigured(provider))?;
                header_str(headers, HmacScheme::Coinbase.header_name()).is_some_and(|header| {
                    signature::verify_webhook_signature(
                        HmacScheme::Coinbase,
                        raw_body,
                        header,
                        secret,
                    )
                })
            }
            ProviderKind::Paypal => {
                let client = self
                    .paypal
                    .as_ref()
                    .ok_or(WebhookError::NotConfigured(provider))?;
                client.verify_webhook(headers, raw_body).await?
            }
        };

        if authentic {
            Ok(())
        } else {
            tracing::warn!(provider = %provider, "Rejected webhook with invalid signature");
            Err(WebhookError::InvalidSignature(provider))
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use url::Url;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new()
            .with_stripe(
                &StripeConfig {
                    secret_key: "sk_test".into(),
                    webhook_secret: "whsec_test".into(),
                    api_base: Url::parse("https://api.stripe.com").unwrap(),
                },
                WebhooksConfig::default(),
            )
            .with_coinbase(&CoinbaseConfig {
                api_key: "key".into(),
                webhook_secret: "cb_secret".into(),
                api_base: Url::parse("https://api.commerce.coinbase.com").unwrap(),
            })
    }

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_stripe_signature() {
        let body = br#"{"type":"checkout.session.completed"}"#;
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let header = signature::sign_stripe_payload(body, b"whsec_test", now);

        let verifier = verifier();
        verifier
            .verify(ProviderKind::Stripe, &headers("stripe-signature", &header), body)
            .await
            .unwrap();

        let stale = signature::sign_stripe_payload(body, b"whsec_test", now - 3600);
        assert!(matches!(
            verifier
                .verify(ProviderKind::Stripe, &headers("stripe-signature", &stale), body)
                .await,
            Err(WebhookError::InvalidSignature(ProviderKind::Stripe))
        ));
        assert!(matches!(
            verifier
                .verify(ProviderKind::Stripe, &HeaderMap::new(), body)
                .await,
            Err(WebhookError::InvalidSignature(ProviderKind::Stripe))
        ));
    }

    #[tokio::test]
    async fn test_coinbase_signature() {
        let body = br#"{"event":{"type":"charge:confirmed"}}"#;
        let digest = signature::hmac_sha256_hex(b"cb_secret", body);

        let verifier = verifier();
        verifier
            .verify(
                ProviderKind::Coinbase,
                &headers("x-cc-webhook-signature", &digest),
                body,
            )
            .await
            .unwrap();
        assert!(
            verifier
                .verify(
                    ProviderKind::Coinbase,
                    &headers("x-cc-webhook-signature", &digest),
                    br#"{"event":{"type":"charge:failed"}}"#,
                )
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        assert!(matches!(
            verifier()
                .verify(ProviderKind::Paypal, &HeaderMap::new(), b"{}")
                .await,
            Err(WebhookError::NotConfigured(ProviderKind::Paypal))
        ));
    }
}
