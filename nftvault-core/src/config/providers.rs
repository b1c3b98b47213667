//! Credentials for the payment providers.
//!
//! A provider whose section is absent from the config file is simply not
//! registered; orders and webhooks naming it fail with a configuration
//! error.

use url::Url;

/// Stripe Checkout credentials.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// `sk_...` key used as bearer token.
    pub secret_key: String,
    /// `whsec_...` signing secret for the `stripe-signature` header.
    pub webhook_secret: String,
    /// `https://api.stripe.com` unless overridden.
    pub api_base: Url,
}

/// Coinbase Commerce credentials.
#[derive(Debug, Clone)]
pub struct CoinbaseConfig {
    pub api_key: String,
    /// Shared secret for the `x-cc-webhook-signature` header.
    pub webhook_secret: String,
    /// `https://api.commerce.coinbase.com` unless overridden.
    pub api_base: Url,
}

/// PayPal REST credentials.
#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Id of the webhook registration, needed to verify deliveries.
    pub webhook_id: String,
    /// `https://api-m.paypal.com` (or the sandbox) unless overridden.
    pub api_base: Url,
}
