//! TOML file configuration structures.
//!
//! These structs directly map to the `nftvault-config.toml` file format.

use nftvault_sdk::objects::ProviderKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub checkout: CheckoutConfig,
    pub claims: ClaimsConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe: Option<StripeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coinbase: Option<CoinbaseConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paypal: Option<PayPalConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Where orders, claims and idempotency records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Postgres at `DATABASE_URL`.
    #[default]
    Postgres,
    /// Process memory; lost on restart and not shared between instances.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How often expired rows are deleted. `0` disables the sweep.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            max_connections: default_max_connections(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_purge_interval() -> u64 {
    300
}

/// The item every order buys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub success_url: Url,
    pub cancel_url: Url,
    pub default_provider: ProviderKind,
}

/// Claim token signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsConfig {
    /// HMAC secret for claim tokens and mint signatures.
    pub secret: String,
    #[serde(default = "default_claim_ttl")]
    pub claim_ttl_secs: u64,
    #[serde(default = "default_mint_ttl")]
    pub mint_ttl_secs: u64,
}

fn default_claim_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_mint_ttl() -> u64 {
    15 * 60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksConfig {
    /// Maximum age of a Stripe signature timestamp.
    #[serde(default = "default_stripe_tolerance")]
    pub stripe_tolerance_secs: i64,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            stripe_tolerance_secs: default_stripe_tolerance(),
        }
    }
}

fn default_stripe_tolerance() -> i64 {
    nftvault_sdk::signature::DEFAULT_STRIPE_TOLERANCE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    #[serde(default = "default_stripe_api")]
    pub api_base: Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinbaseConfig {
    pub api_key: String,
    pub webhook_secret: String,
    #[serde(default = "default_coinbase_api")]
    pub api_base: Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub webhook_id: String,
    /// Point at `https://api-m.sandbox.paypal.com` for testing.
    #[serde(default = "default_paypal_api")]
    pub api_base: Url,
}

fn default_stripe_api() -> Url {
    static_url("https://api.stripe.com")
}

fn default_coinbase_api() -> Url {
    static_url("https://api.commerce.coinbase.com")
}

fn default_paypal_api() -> Url {
    static_url("https://api-m.paypal.com")
}

fn static_url(url: &'static str) -> Url {
    // Only called with the literals above, which always parse.
    Url::parse(url).unwrap_or_else(|_| unreachable!("invalid built-in url {url}"))
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }

    /// Whether credentials for `kind` are present.
    pub fn has_provider(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Stripe => self.stripe.is_some(),
            ProviderKind::Coinbase => self.coinbase.is_some(),
            ProviderKind::Paypal => self.paypal.is_some(),
        }
    }
}
