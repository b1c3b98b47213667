//! Configuration module for nftvault-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;

use crate::config::file::{FileConfig, StorageConfig};
use nftvault_core::config::{
    AdminConfig, CheckoutConfig, ClaimsConfig, CoinbaseConfig, PayPalConfig, StripeConfig,
    VaultConfig, WebhooksConfig,
};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Claim secrets shorter than this are rejected.
const MIN_CLAIMS_SECRET_LEN: usize = 32;

/// Longest accepted claim or mint lifetime: one year.
const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub storage: StorageConfig,
    pub vault: VaultConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the engine configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        let secret_hash = if file_config.is_admin_secret_hashed() {
            file_config.admin.secret.clone()
        } else {
            let hash = hash_secret(&file_config.admin.secret)?;
            file_config.admin.secret = hash.clone();
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        Ok(build_loaded_config(file_config, secret_hash))
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.admin.secret.trim().is_empty() {
        return Err(invalid("admin.secret must not be empty"));
    }
    if config.claims.secret.len() < MIN_CLAIMS_SECRET_LEN {
        return Err(invalid(format!(
            "claims.secret must be at least {MIN_CLAIMS_SECRET_LEN} bytes"
        )));
    }
    if config.claims.claim_ttl_secs == 0 || config.claims.mint_ttl_secs == 0 {
        return Err(invalid("claims TTLs must be positive"));
    }
    if config.claims.claim_ttl_secs > MAX_TOKEN_TTL_SECS
        || config.claims.mint_ttl_secs > MAX_TOKEN_TTL_SECS
    {
        return Err(invalid(format!(
            "claims TTLs must not exceed {MAX_TOKEN_TTL_SECS} seconds"
        )));
    }
    if config.webhooks.stripe_tolerance_secs <= 0 {
        return Err(invalid("webhooks.stripe_tolerance_secs must be positive"));
    }

    let checkout = &config.checkout;
    if checkout.amount <= Decimal::ZERO {
        return Err(invalid("checkout.amount must be positive"));
    }
    if checkout.currency.len() != 3 || !checkout.currency.chars().all(|c| c.is_ascii_alphabetic())
    {
        return Err(invalid(format!(
            "checkout.currency {:?} is not a three-letter code",
            checkout.currency
        )));
    }
    if checkout.description.trim().is_empty() {
        return Err(invalid("checkout.description must not be empty"));
    }
    if !config.has_provider(checkout.default_provider) {
        return Err(invalid(format!(
            "default provider {} has no [{}] section",
            checkout.default_provider, checkout.default_provider
        )));
    }

    if config
        .stripe
        .as_ref()
        .is_some_and(|s| s.secret_key.is_empty() || s.webhook_secret.is_empty())
    {
        return Err(invalid("stripe.secret_key and stripe.webhook_secret are required"));
    }
    if config
        .coinbase
        .as_ref()
        .is_some_and(|c| c.api_key.is_empty() || c.webhook_secret.is_empty())
    {
        return Err(invalid("coinbase.api_key and coinbase.webhook_secret are required"));
    }
    if config.paypal.as_ref().is_some_and(|p| {
        p.client_id.is_empty() || p.client_secret.is_empty() || p.webhook_id.is_empty()
    }) {
        return Err(invalid(
            "paypal.client_id, paypal.client_secret and paypal.webhook_id are required",
        ));
    }
    Ok(())
}

pub(crate) fn hash_secret(plaintext: &str) -> Result<String, ConfigError> {
    use argon2::{
        Argon2, PasswordHasher,
        password_hash::{SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ConfigError::HashError(e.to_string()))
}

fn secs(value: u64) -> time::Duration {
    time::Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

fn build_loaded_config(file_config: FileConfig, secret_hash: String) -> LoadedConfig {
    let FileConfig {
        server,
        storage,
        checkout,
        claims,
        webhooks,
        stripe,
        coinbase,
        paypal,
        ..
    } = file_config;

    let vault = VaultConfig {
        admin: AdminConfig::new(secret_hash),
        checkout: CheckoutConfig {
            amount: checkout.amount,
            currency: checkout.currency.to_ascii_uppercase(),
            description: checkout.description,
            success_url: checkout.success_url,
            cancel_url: checkout.cancel_url,
            default_provider: checkout.default_provider,
        },
        claims: ClaimsConfig {
            secret: claims.secret.into_bytes().into_boxed_slice(),
            claim_ttl: secs(claims.claim_ttl_secs),
            mint_ttl: secs(claims.mint_ttl_secs),
        },
        webhooks: WebhooksConfig {
            stripe_tolerance_secs: webhooks.stripe_tolerance_secs,
        },
        stripe: stripe.map(|s| StripeConfig {
            secret_key: s.secret_key,
            webhook_secret: s.webhook_secret,
            api_base: s.api_base,
        }),
        coinbase: coinbase.map(|c| CoinbaseConfig {
            api_key: c.api_key,
            webhook_secret: c.webhook_secret,
            api_base: c.api_base,
        }),
        paypal: paypal.map(|p| PayPalConfig {
            client_id: p.client_id,
            client_secret: p.client_secret,
            webhook_id: p.webhook_id,
            api_base: p.api_base,
        }),
    };

    LoadedConfig {
        listen: server.listen,
        storage,
        vault,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
