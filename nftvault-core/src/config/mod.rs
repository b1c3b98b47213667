//! Runtime configuration types for the vault engine.
//!
//! These are the validated values the coordinator and the provider adapters
//! are built from. Reading and validating the TOML file is the server
//! crate's job.

mod admin;
mod checkout;
mod providers;

pub use admin::AdminConfig;
pub use checkout::{CheckoutConfig, ClaimsConfig, WebhooksConfig};
pub use providers::{CoinbaseConfig, PayPalConfig, StripeConfig};

/// Everything the engine needs, minus storage.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Admin API authentication.
    pub admin: AdminConfig,
    /// What a checkout sells and where buyers are sent back to.
    pub checkout: CheckoutConfig,
    /// Token signing secret and lifetimes.
    pub claims: ClaimsConfig,
    /// Webhook verification settings.
    pub webhooks: WebhooksConfig,
    pub stripe: Option<StripeConfig>,
    pub coinbase: Option<CoinbaseConfig>,
    pub paypal: Option<PayPalConfig>,
}
