//! Claim token service.
//!
//! Issues and verifies the two signed credentials of the lifecycle:
//!
//! * the **claim token** handed to a wallet-less buyer at checkout
//!   (default lifetime 7 days), and
//! * the **mint signature** returned when a claim is consumed
//!   (default lifetime 15 minutes).
//!
//! Both use the format of [`nftvault_sdk::token`] and differ only by their
//! `type` field.

use nftvault_sdk::token::{self, TokenError, TokenKind, TokenPayload};
use thiserror::Error;
use time::Duration;
use uuid::Uuid;

/// Default lifetime of a claim token.
pub const DEFAULT_CLAIM_TTL: Duration = Duration::days(7);

/// Default lifetime of a mint signature.
pub const DEFAULT_MINT_TTL: Duration = Duration::minutes(15);

/// Errors raised while issuing a token.
#[derive(Debug, Error)]
pub enum IssueError {
    /// The lifetime does not fit a Unix-millisecond expiry
    #[error("token lifetime {0} is out of range")]
    TtlOutOfRange(Duration),

    #[error("failed to encode token payload: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// A freshly signed token with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    /// Unix milliseconds.
    pub expires_at: i64,
}

/// Signs and verifies claim tokens and mint signatures with a server secret.
#[derive(Debug, Clone)]
pub struct ClaimTokenService {
    secret: Box<[u8]>,
    claim_ttl: Duration,
    mint_ttl: Duration,
}

impl ClaimTokenService {
    pub fn new(secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            secret: secret.into(),
            claim_ttl: DEFAULT_CLAIM_TTL,
            mint_ttl: DEFAULT_MINT_TTL,
        }
    }

    pub fn with_ttls(mut self, claim_ttl: Duration, mint_ttl: Duration) -> Self {
        self.claim_ttl = claim_ttl;
        self.mint_ttl = mint_ttl;
        self
    }

    pub fn claim_ttl(&self) -> Duration {
        self.claim_ttl
    }

    /// Issue a claim token with an explicit lifetime. A negative `ttl`
    /// yields a token that is already expired.
    pub fn issue(
        &self,
        order_id: Uuid,
        wallet_address: Option<String>,
        ttl: Duration,
    ) -> Result<IssuedToken, IssueError> {
        self.sign(TokenKind::Claim, order_id, wallet_address, ttl)
    }

    /// Issue a claim token with the configured lifetime.
    pub fn issue_claim(
        &self,
        order_id: Uuid,
        wallet_address: Option<String>,
    ) -> Result<IssuedToken, IssueError> {
        self.issue(order_id, wallet_address, self.claim_ttl)
    }

    /// Issue a mint signature bound to `wallet_address`.
    pub fn issue_mint_signature(
        &self,
        order_id: Uuid,
        wallet_address: String,
    ) -> Result<IssuedToken, IssueError> {
        self.sign(TokenKind::Mint, order_id, Some(wallet_address), self.mint_ttl)
    }

    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        token::verify_token(token, &self.secret, TokenKind::Claim, nftvault_sdk::now_millis())
    }

    pub fn verify_mint_signature(&self, token: &str) -> Result<TokenPayload, TokenError> {
        token::verify_token(token, &self.secret, TokenKind::Mint, nftvault_sdk::now_millis())
    }

    fn sign(
        &self,
        kind: TokenKind,
        order_id: Uuid,
        wallet_address: Option<String>,
        ttl: Duration,
    ) -> Result<IssuedToken, IssueError> {
        let expires_at = i64::try_from(ttl.whole_milliseconds())
            .ok()
            .and_then(|ttl_ms| nftvault_sdk::now_millis().checked_add(ttl_ms))
            .ok_or(IssueError::TtlOutOfRange(ttl))?;
        let payload = TokenPayload::new(kind, order_id, wallet_address, expires_at);
        Ok(IssuedToken {
            token: token::sign_token(&payload, &self.secret)?,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ClaimTokenService {
        ClaimTokenService::new(b"server-secret".to_vec())
    }

    #[test]
    fn test_issue_and_verify_claim() {
        let service = service();
        let order_id = Uuid::new_v4();
        let issued = service.issue_claim(order_id, None).unwrap();
        let payload = service.verify(&issued.token).unwrap();
        assert_eq!(payload.order_id, order_id);
        assert_eq!(payload.wallet_address, None);
        assert_eq!(payload.expires_at, issued.expires_at);
        let week_ms = 7 * 24 * 60 * 60 * 1000;
        assert!(issued.expires_at - nftvault_sdk::now_millis() <= week_ms);
        assert!(issued.expires_at - nftvault_sdk::now_millis() > week_ms - 60_000);
    }

    #[test]
    fn test_negative_ttl_is_expired() {
        let service = service();
        let issued = service
            .issue(Uuid::new_v4(), None, Duration::milliseconds(-1))
            .unwrap();
        assert_eq!(service.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_unrepresentable_ttl_is_an_error() {
        let service = service().with_ttls(Duration::MAX, DEFAULT_MINT_TTL);
        assert!(matches!(
            service.issue_claim(Uuid::new_v4(), None),
            Err(IssueError::TtlOutOfRange(_))
        ));
        // Fits in i64 milliseconds but overflows once added to now.
        assert!(matches!(
            service.issue(Uuid::new_v4(), None, Duration::milliseconds(i64::MAX)),
            Err(IssueError::TtlOutOfRange(_))
        ));
        assert!(matches!(
            service.issue(Uuid::new_v4(), None, Duration::MIN),
            Err(IssueError::TtlOutOfRange(_))
        ));
        assert!(service.issue_mint_signature(Uuid::new_v4(), "0xabc".into()).is_ok());
    }

    #[test]
    fn test_mint_signature_is_not_a_claim_token() {
        let service = service();
        let order_id = Uuid::new_v4();
        let mint = service
            .issue_mint_signature(order_id, "0xabc".into())
            .unwrap();
        assert!(service.verify(&mint.token).is_err());
        let payload = service.verify_mint_signature(&mint.token).unwrap();
        assert_eq!(payload.wallet_address.as_deref(), Some("0xabc"));

        let claim = service.issue_claim(order_id, None).unwrap();
        assert!(service.verify_mint_signature(&claim.token).is_err());
    }

    #[test]
    fn test_other_secret_rejected() {
        let issued = service().issue_claim(Uuid::new_v4(), None).unwrap();
        let other = ClaimTokenService::new(b"another-secret".to_vec());
        assert_eq!(
            other.verify(&issued.token),
            Err(TokenError::SignatureMismatch)
        );
    }
}
