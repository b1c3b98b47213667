//! Order lifecycle coordinator.
//!
//! [`OrderLifecycle`] owns every state transition of an order:
//!
//! ```text
//! pending ──payment confirmed──▶ paid ──mint confirmed──▶ minted
//!    │
//!    └────payment failed──────▶ failed
//! ```
//!
//! Each transition is a [`kanau::processor::Processor`] implementation keyed
//! by its input type (`CreateOrder`, `ConfirmPayment`, `RedeemClaim`, ...).
//! Side effects that a provider may deliver more than once go through the
//! [`IdempotencyGuard`]; claim redemption relies on the store's
//! compare-and-swap instead.

mod claims;
mod orders;
mod payments;

pub use claims::{ConfirmMint, InspectClaim, RedeemClaim};
pub use orders::{CreateOrder, GetOrder, ListDeadLetters, ListRecentOrders, RetryCheckout};
pub use payments::{
    CapturePayment, ConfirmPayment, FailPayment, PaymentConfirmation, WebhookDelivery,
    WebhookOutcome,
};

use crate::config::{CheckoutConfig, VaultConfig};
use crate::idempotency::{Admission, IdempotencyGuard};
use crate::providers::{
    CoinbaseProvider, PayPalClient, PayPalProvider, PaymentProviders, ProviderError,
    StripeProvider,
};
use crate::storage::{KvStore, StoreError, VaultRepository};
use crate::tokens::{ClaimTokenService, IssueError};
use crate::webhooks::{WebhookError, WebhookVerifier};
use nftvault_sdk::token::TokenError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Longest accepted wallet address or transaction hash.
const MAX_IDENTIFIER_LEN: usize = 128;

/// Errors raised by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Malformed or missing input
    #[error("invalid request: {0}")]
    Validation(String),

    /// Bad webhook signature, or an invalid / expired token
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("{0} not found")]
    NotFound(String),

    /// A status precondition does not hold
    #[error("conflict: {0}")]
    Conflict(String),

    /// Another delivery of the same operation holds the idempotency lease
    #[error("operation in progress: {0}")]
    InProgress(String),

    /// The claim was already redeemed
    #[error("gone: {0}")]
    Gone(String),

    /// Missing secret or credential
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The order was stored but the provider could not open a checkout
    #[error("checkout for order {order_id} failed: {source}")]
    Checkout {
        order_id: Uuid,
        claim_token: Option<String>,
        source: ProviderError,
    },

    /// A provider call other than checkout failed
    #[error("payment provider error: {0}")]
    Upstream(ProviderError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LifecycleError {
    /// Whether a webhook failing with this error should be parked rather
    /// than retried by the provider.
    pub fn is_permanent_for_webhook(&self) -> bool {
        matches!(
            self,
            LifecycleError::Validation(_)
                | LifecycleError::NotFound(_)
                | LifecycleError::Conflict(_)
                | LifecycleError::Gone(_)
        )
    }
}

impl From<TokenError> for LifecycleError {
    fn from(e: TokenError) -> Self {
        LifecycleError::Authentication(e.to_string())
    }
}

impl From<IssueError> for LifecycleError {
    fn from(e: IssueError) -> Self {
        match e {
            IssueError::TtlOutOfRange(_) => LifecycleError::Configuration(e.to_string()),
            IssueError::Encoding(source) => LifecycleError::from(source),
        }
    }
}

impl From<serde_json::Error> for LifecycleError {
    fn from(e: serde_json::Error) -> Self {
        LifecycleError::Storage(StoreError::Serialization(e))
    }
}

impl From<ProviderError> for LifecycleError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotConfigured(kind) => {
                LifecycleError::Configuration(format!("payment provider {kind} is not configured"))
            }
            other => LifecycleError::Upstream(other),
        }
    }
}

impl From<WebhookError> for LifecycleError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::NotConfigured(kind) => {
                LifecycleError::Configuration(format!("webhooks for {kind} are not configured"))
            }
            WebhookError::InvalidSignature(_) => LifecycleError::Authentication(e.to_string()),
            WebhookError::Verification(source) => LifecycleError::from(source),
            WebhookError::Malformed { .. } => LifecycleError::Validation(e.to_string()),
        }
    }
}

/// The coordinator. Cheap to clone; clones share storage and providers.
#[derive(Clone)]
pub struct OrderLifecycle {
    repository: VaultRepository,
    guard: IdempotencyGuard,
    tokens: ClaimTokenService,
    providers: PaymentProviders,
    verifier: WebhookVerifier,
    checkout: Arc<CheckoutConfig>,
}

impl OrderLifecycle {
    pub fn new(
        repository: VaultRepository,
        tokens: ClaimTokenService,
        providers: PaymentProviders,
        verifier: WebhookVerifier,
        checkout: CheckoutConfig,
    ) -> Self {
        Self {
            guard: IdempotencyGuard::new(repository.store()),
            repository,
            tokens,
            providers,
            verifier,
            checkout: Arc::new(checkout),
        }
    }

    /// Wire up every configured provider over `store`.
    pub fn from_config(store: Arc<dyn KvStore>, config: &VaultConfig) -> Self {
        let redirects = config.checkout.redirect_urls();
        let mut providers = PaymentProviders::new(config.checkout.default_provider);
        let mut verifier = WebhookVerifier::new();

        if let Some(stripe) = &config.stripe {
            providers = providers.with(Arc::new(StripeProvider::new(
                stripe.clone(),
                redirects.clone(),
            )));
            verifier = verifier.with_stripe(stripe, config.webhooks);
        }
        if let Some(coinbase) = &config.coinbase {
            providers = providers.with(Arc::new(CoinbaseProvider::new(
                coinbase.clone(),
                redirects.clone(),
            )));
            verifier = verifier.with_coinbase(coinbase);
        }
        if let Some(paypal) = &config.paypal {
            let client = Arc::new(PayPalClient::new(paypal.clone()));
            providers = providers.with(Arc::new(PayPalProvider::new(
                Arc::clone(&client),
                redirects,
            )));
            verifier = verifier.with_paypal(client);
        }

        let tokens = ClaimTokenService::new(config.claims.secret.clone())
            .with_ttls(config.claims.claim_ttl, config.claims.mint_ttl);

        Self::new(
            VaultRepository::new(store),
            tokens,
            providers,
            verifier,
            config.checkout.clone(),
        )
    }

    pub fn repository(&self) -> &VaultRepository {
        &self.repository
    }

    pub fn tokens(&self) -> &ClaimTokenService {
        &self.tokens
    }

    pub fn providers(&self) -> &PaymentProviders {
        &self.providers
    }

    /// Run `op` at most once per `key`.
    ///
    /// A replayed key returns the cached result without calling `op`. A
    /// failed `op` releases the lease so the operation can be retried.
    async fn run_once<T, F, Fut>(&self, key: String, op: F) -> Result<T, LifecycleError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(i64) -> Fut,
        Fut: Future<Output = Result<T, LifecycleError>>,
    {
        let now = nftvault_sdk::now_millis();
        match self.guard.begin(&key, now).await? {
            Admission::Proceed => {}
            Admission::Replay(cached) => {
                debug!(key, "Idempotent replay");
                return Ok(serde_json::from_value(cached)?);
            }
            Admission::InFlight => return Err(LifecycleError::InProgress(key)),
        }

        match op(now).await {
            Ok(result) => {
                // The mutation is committed; a lost record only weakens replay.
                if let Err(e) = self.guard.record(&key, &result, now).await {
                    error!(key, error = %e, "Failed to record idempotent result");
                }
                Ok(result)
            }
            Err(e) => {
                self.guard.abandon(&key).await;
                Err(e)
            }
        }
    }
}

/// Accept a wallet address or tx hash: non-empty, bounded, ASCII
/// alphanumeric (hex with `0x`, base58 and bech32 all qualify).
fn validate_identifier(field: &str, value: &str) -> Result<String, LifecycleError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(LifecycleError::Validation(format!("{field} is required")));
    }
    if value.len() > MAX_IDENTIFIER_LEN || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        warn!(field, "Rejected malformed identifier");
        return Err(LifecycleError::Validation(format!("{field} is malformed")));
    }
    Ok(value.to_owned())
}
