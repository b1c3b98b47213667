//! Signed claim and mint tokens.
//!
//! A token is a JSON payload followed by its HMAC-SHA256, packed into a
//! single URL-safe string:
//!
//! ```text
//! base64url_nopad( {payload_json} "." {hex(HMAC-SHA256(payload_json, secret))} )
//! ```
//!
//! The payload carries a `type` discriminator so a claim token can never be
//! presented where a mint signature is expected, and the other way round.
//! The HMAC is checked over the exact payload bytes found in the token; the
//! JSON is only parsed after the signature matched.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hex length of an HMAC-SHA256 tag.
const SIGNATURE_HEX_LEN: usize = 64;

/// What a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Right to redeem a paid order later.
    Claim,
    /// Short-lived authorization for the on-chain mint call.
    Mint,
}

/// The signed content of a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub order_id: Uuid,
    pub wallet_address: Option<String>,
    /// Unix milliseconds.
    pub expires_at: i64,
    /// 128 random bits, hex encoded.
    pub nonce: String,
}

impl TokenPayload {
    /// Build a payload with a fresh random nonce.
    pub fn new(
        kind: TokenKind,
        order_id: Uuid,
        wallet_address: Option<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            kind,
            order_id,
            wallet_address,
            expires_at,
            nonce: hex::encode(rand::random::<[u8; 16]>()),
        }
    }
}

/// Reasons a token is rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not valid base64")]
    InvalidEncoding,
    #[error("token has no signature part")]
    MissingSignature,
    #[error("token signature mismatch")]
    SignatureMismatch,
    #[error("token payload is malformed")]
    MalformedPayload,
    #[error("token is a {found:?} token, expected {expected:?}")]
    WrongKind { expected: TokenKind, found: TokenKind },
    #[error("token expired")]
    Expired,
}

/// Sign `payload` with `secret` and return the packed token string.
pub fn sign_token(payload: &TokenPayload, secret: &[u8]) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(payload)?;
    let signature = ring::hmac::sign(&hmac_key(secret), json.as_bytes());

    let mut packed = json.into_bytes();
    packed.push(b'.');
    packed.extend_from_slice(hex::encode(signature.as_ref()).as_bytes());
    Ok(fast32::base64::RFC4648_URL_NOPAD.encode(&packed))
}

/// Verify a packed token.
///
/// Checks, in order: encoding, signature, payload shape, kind, expiry
/// against `now_ms`.
pub fn verify_token(
    token: &str,
    secret: &[u8],
    expected: TokenKind,
    now_ms: i64,
) -> Result<TokenPayload, TokenError> {
    let packed = fast32::base64::RFC4648_URL_NOPAD
        .decode_str(token.trim())
        .map_err(|_| TokenError::InvalidEncoding)?;

    let dot = packed
        .iter()
        .rposition(|b| *b == b'.')
        .ok_or(TokenError::MissingSignature)?;
    let (payload_bytes, signature_hex) = (&packed[..dot], &packed[dot + 1..]);

    // Lowercase hex only, so every encoding of a signature is unique.
    if signature_hex.len() != SIGNATURE_HEX_LEN
        || !signature_hex
            .iter()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
    {
        return Err(TokenError::SignatureMismatch);
    }
    let signature = hex::decode(signature_hex).map_err(|_| TokenError::SignatureMismatch)?;
    ring::hmac::verify(&hmac_key(secret), payload_bytes, &signature)
        .map_err(|_| TokenError::SignatureMismatch)?;

    let payload: TokenPayload =
        serde_json::from_slice(payload_bytes).map_err(|_| TokenError::MalformedPayload)?;

    if payload.kind != expected {
        return Err(TokenError::WrongKind {
            expected,
            found: payload.kind,
        });
    }
    if now_ms > payload.expires_at {
        return Err(TokenError::Expired);
    }
    Ok(payload)
}

fn hmac_key(secret: &[u8]) -> ring::hmac::Key {
    ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret)
}
