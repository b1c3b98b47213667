//! Payment provider adapters.
//!
//! Every checkout backend implements [`PaymentProvider`]: given an order it
//! opens a hosted payment session and returns where to send the buyer plus
//! the provider's own id for the session. Implementations are chosen once,
//! at construction time, and collected into a [`PaymentProviders`] registry.
//!
//! Provider callbacks arrive later as webhooks; see [`crate::webhooks`].

mod coinbase;
mod paypal;
mod stripe;

pub use coinbase::CoinbaseProvider;
pub use paypal::{PayPalClient, PayPalProvider};
pub use stripe::StripeProvider;

use crate::entities::Order;
use async_trait::async_trait;
use nftvault_sdk::objects::ProviderKind;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Timeout for every outbound provider request.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by a payment provider adapter.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials for the provider are absent
    #[error("payment provider {0} is not configured")]
    NotConfigured(ProviderKind),

    /// The provider answered with a non-success status
    #[error("{provider} request failed with status {status}: {body}")]
    RequestFailed {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered 2xx but the body is not what we expect
    #[error("unexpected response from {provider}: {reason}")]
    InvalidResponse {
        provider: ProviderKind,
        reason: String,
    },

    /// The amount cannot be expressed for this provider
    #[error("amount {amount} {currency} cannot be charged")]
    InvalidAmount { amount: Decimal, currency: String },
}

/// A hosted payment session opened with a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Where the buyer completes the payment.
    pub redirect_url: String,
    /// The provider's session / charge / order id.
    pub provider_charge_id: String,
}

/// Where an approved payment stands after [`PaymentProvider::capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// Funds are collected.
    Completed,
    /// Accepted, but the provider settles it later and reports by webhook.
    Pending,
    Declined,
}

/// A checkout backend.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Open a hosted payment session for `order`.
    async fn create_checkout(&self, order: &Order) -> Result<CheckoutSession, ProviderError>;

    /// Collect a payment the buyer approved, identified by the provider's
    /// own id. Providers that charge during checkout never report an
    /// approval, so the default has nothing to collect.
    async fn capture(&self, provider_payment_id: &str) -> Result<CaptureStatus, ProviderError> {
        let _ = provider_payment_id;
        Ok(CaptureStatus::Completed)
    }
}

/// The fixed success / cancel pair every checkout redirects back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectUrls {
    pub success: Url,
    pub cancel: Url,
}

impl RedirectUrls {
    pub fn new(success: Url, cancel: Url) -> Self {
        Self { success, cancel }
    }

    /// `(success, cancel)` with `orderId` appended as a query parameter.
    pub fn for_order(&self, order_id: Uuid) -> (String, String) {
        let tag = |base: &Url| {
            let mut url = base.clone();
            url.query_pairs_mut()
                .append_pair("orderId", &order_id.to_string());
            url.to_string()
        };
        (tag(&self.success), tag(&self.cancel))
    }
}

/// The configured providers, keyed by kind, plus the default choice.
#[derive(Clone)]
pub struct PaymentProviders {
    providers: HashMap<ProviderKind, Arc<dyn PaymentProvider>>,
    default: ProviderKind,
}

impl PaymentProviders {
    pub fn new(default: ProviderKind) -> Self {
        Self {
            providers: HashMap::new(),
            default,
        }
    }

    /// Register a provider, replacing any previous one of the same kind.
    pub fn with(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn default_kind(&self) -> ProviderKind {
        self.default
    }

    /// `requested` if given, the configured default otherwise.
    pub fn resolve(&self, requested: Option<ProviderKind>) -> ProviderKind {
        requested.unwrap_or(self.default)
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn PaymentProvider>, ProviderError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or(ProviderError::NotConfigured(kind))
    }
}

/// Shared HTTP client settings for provider calls.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Turn a non-2xx response into [`ProviderError::RequestFailed`].
pub(crate) async fn ensure_success(
    provider: ProviderKind,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::RequestFailed {
        provider,
        status: status.as_u16(),
        body,
    })
}

/// Currencies Stripe charges without a fractional unit.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

/// Amount in the currency's smallest unit (cents for USD, yen for JPY).
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64, ProviderError> {
    let invalid = || ProviderError::InvalidAmount {
        amount,
        currency: currency.to_owned(),
    };
    if amount <= Decimal::ZERO {
        return Err(invalid());
    }
    let scaled = if ZERO_DECIMAL_CURRENCIES.contains(&currency.to_ascii_uppercase().as_str()) {
        amount
    } else {
        amount * Decimal::ONE_HUNDRED
    };
    scaled.round().to_i64().ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopProvider(ProviderKind);

    #[async_trait]
    impl PaymentProvider for NoopProvider {
        fn kind(&self) -> ProviderKind {
            self.0
        }

        async fn create_checkout(&self, order: &Order) -> Result<CheckoutSession, ProviderError> {
            Ok(CheckoutSession {
                redirect_url: format!("https://pay.example/{}", order.id),
                provider_charge_id: "noop".into(),
            })
        }
    }

    #[test]
    fn test_registry_resolution() {
        let providers = PaymentProviders::new(ProviderKind::Stripe)
            .with(Arc::new(NoopProvider(ProviderKind::Stripe)));
        assert_eq!(providers.resolve(None), ProviderKind::Stripe);
        assert_eq!(
            providers.resolve(Some(ProviderKind::Paypal)),
            ProviderKind::Paypal
        );
        assert!(providers.get(ProviderKind::Stripe).is_ok());
        assert!(matches!(
            providers.get(ProviderKind::Coinbase),
            Err(ProviderError::NotConfigured(ProviderKind::Coinbase))
        ));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(
            to_minor_units(Decimal::new(4999, 2), "usd").unwrap(),
            4999
        );
        assert_eq!(to_minor_units(Decimal::new(1500, 0), "JPY").unwrap(), 1500);
        assert_eq!(to_minor_units(Decimal::new(10005, 3), "EUR").unwrap(), 1000);
        assert!(to_minor_units(Decimal::ZERO, "USD").is_err());
        assert!(to_minor_units(Decimal::new(-1, 0), "USD").is_err());
    }

    #[test]
    fn test_redirect_urls_carry_order_id() {
        let urls = RedirectUrls::new(
            Url::parse("https://vault.example/success").unwrap(),
            Url::parse("https://vault.example/cancel?from=checkout").unwrap(),
        );
        let id = Uuid::nil();
        let (success, cancel) = urls.for_order(id);
        assert_eq!(success, format!("https://vault.example/success?orderId={id}"));
        assert_eq!(
            cancel,
            format!("https://vault.example/cancel?from=checkout&orderId={id}")
        );
    }
}
