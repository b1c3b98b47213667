use crate::providers::RedirectUrls;
use nftvault_sdk::objects::ProviderKind;
use nftvault_sdk::signature::DEFAULT_STRIPE_TOLERANCE;
use rust_decimal::Decimal;
use time::Duration;
use url::Url;

/// The single item a vault checkout sells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    pub amount: Decimal,
    /// ISO 4217 code, upper case.
    pub currency: String,
    /// Line item name shown on the hosted payment page.
    pub description: String,
    pub success_url: Url,
    pub cancel_url: Url,
    /// Used when an order request names no provider.
    pub default_provider: ProviderKind,
}

impl CheckoutConfig {
    pub fn redirect_urls(&self) -> RedirectUrls {
        RedirectUrls::new(self.success_url.clone(), self.cancel_url.clone())
    }
}

/// Claim token and mint signature settings.
#[derive(Debug, Clone)]
pub struct ClaimsConfig {
    /// HMAC key for both token kinds.
    pub secret: Box<[u8]>,
    pub claim_ttl: Duration,
    pub mint_ttl: Duration,
}

/// Webhook verification settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhooksConfig {
    /// Maximum age of a Stripe signature timestamp, in seconds.
    pub stripe_tolerance_secs: i64,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            stripe_tolerance_secs: DEFAULT_STRIPE_TOLERANCE,
        }
    }
}
