//! Webhook signature schemes used by the payment providers.
//!
//! Every scheme here is HMAC-SHA256 computed over the **raw** request body,
//! so callers must hand in the exact bytes they received, before any JSON
//! parsing.
//!
//! ```text
//! stripe-signature:        t={unix_timestamp},v1={hex},v1={hex},v0={hex}
//!                          HMAC-SHA256("{timestamp}.{raw_body}", secret)
//! x-cc-webhook-signature:  {hex}
//!                          HMAC-SHA256(raw_body, secret)
//! ```
//!
//! PayPal does not sign with a shared secret; its webhooks are checked by
//! the core crate through PayPal's verification API.
//!
//! Verification never fails loudly: malformed headers, bad hex or a
//! mismatching digest all come back as `false`. Digest comparison is done
//! by [`ring::hmac::verify`], which is constant time.

/// Header carrying the Stripe signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Header carrying the Coinbase Commerce signature.
pub const COINBASE_SIGNATURE_HEADER: &str = "x-cc-webhook-signature";

/// Default tolerance for the Stripe signature timestamp (in seconds).
pub const DEFAULT_STRIPE_TOLERANCE: i64 = 5 * 60;

/// The shared-secret HMAC schemes understood by [`verify_webhook_signature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HmacScheme {
    /// `t=…,v1=…` header, digest over `"{t}.{body}"`.
    Stripe,
    /// Bare hex digest over the body.
    Coinbase,
}

impl HmacScheme {
    /// Name of the request header carrying the signature.
    pub fn header_name(&self) -> &'static str {
        match self {
            HmacScheme::Stripe => STRIPE_SIGNATURE_HEADER,
            HmacScheme::Coinbase => COINBASE_SIGNATURE_HEADER,
        }
    }
}

/// Verify a webhook signature header against the raw body.
///
/// Stripe timestamps are not checked for freshness here; use
/// [`verify_stripe_signature`] with a tolerance for that.
pub fn verify_webhook_signature(
    scheme: HmacScheme,
    raw_body: &[u8],
    signature_header: &str,
    secret: &[u8],
) -> bool {
    match scheme {
        HmacScheme::Stripe => verify_stripe_signature(raw_body, signature_header, secret, None),
        HmacScheme::Coinbase => verify_coinbase_signature(raw_body, signature_header, secret),
    }
}

/// Parsed form of a `stripe-signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeSignatureHeader {
    pub timestamp: i64,
    pub v1: Vec<String>,
}

/// Parse a `stripe-signature` header.
///
/// Returns `None` when the timestamp or every `v1` entry is missing.
/// Unknown keys (`v0`, future schemes) are skipped.
pub fn parse_stripe_header(value: &str) -> Option<StripeSignatureHeader> {
    let mut timestamp = None;
    let mut v1 = Vec::new();
    for part in value.split(',') {
        let Some((key, val)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = val.parse::<i64>().ok(),
            "v1" => v1.push(val.to_owned()),
            _ => {}
        }
    }
    let timestamp = timestamp?;
    if v1.is_empty() {
        return None;
    }
    Some(StripeSignatureHeader { timestamp, v1 })
}

/// Verify a Stripe webhook.
///
/// With `tolerance = Some(secs)` the header timestamp must be within
/// `secs` of the current time.
pub fn verify_stripe_signature(
    raw_body: &[u8],
    signature_header: &str,
    secret: &[u8],
    tolerance: Option<i64>,
) -> bool {
    let Some(header) = parse_stripe_header(signature_header) else {
        return false;
    };

    if let Some(tolerance) = tolerance {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        // A negative tolerance accepts nothing.
        let Ok(tolerance) = u64::try_from(tolerance) else {
            return false;
        };
        if now.abs_diff(header.timestamp) > tolerance {
            return false;
        }
    }

    let mut signed = Vec::with_capacity(raw_body.len() + 24);
    signed.extend_from_slice(header.timestamp.to_string().as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(raw_body);

    let key = hmac_key(secret);
    header.v1.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|digest| ring::hmac::verify(&key, &signed, &digest).is_ok())
            .unwrap_or(false)
    })
}

/// Verify a Coinbase Commerce webhook.
pub fn verify_coinbase_signature(raw_body: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Ok(digest) = hex::decode(signature_header.trim()) else {
        return false;
    };
    ring::hmac::verify(&hmac_key(secret), raw_body, &digest).is_ok()
}

/// Hex encoded HMAC-SHA256 of `data`.
pub fn hmac_sha256_hex(secret: &[u8], data: &[u8]) -> String {
    hex::encode(ring::hmac::sign(&hmac_key(secret), data).as_ref())
}

/// Build a `stripe-signature` header value for `raw_body` at `timestamp`.
pub fn sign_stripe_payload(raw_body: &[u8], secret: &[u8], timestamp: i64) -> String {
    let mut signed = format!("{timestamp}.").into_bytes();
    signed.extend_from_slice(raw_body);
    format!("t={},v1={}", timestamp, hmac_sha256_hex(secret, &signed))
}

fn hmac_key(secret: &[u8]) -> ring::hmac::Key {
    ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test123secret456";
    const BODY: &[u8] = br#"{"type":"checkout.session.completed"}"#;

    fn now() -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp()
    }

    #[test]
    fn test_stripe_valid_signature() {
        let header = sign_stripe_payload(BODY, SECRET, now());
        assert!(verify_webhook_signature(
            HmacScheme::Stripe,
            BODY,
            &header,
            SECRET
        ));
        assert!(verify_stripe_signature(BODY, &header, SECRET, Some(300)));
    }

    #[test]
    fn test_stripe_wrong_secret() {
        let header = sign_stripe_payload(BODY, b"wrong_secret", now());
        assert!(!verify_stripe_signature(BODY, &header, SECRET, None));
    }

    #[test]
    fn test_stripe_modified_payload() {
        let header = sign_stripe_payload(BODY, SECRET, now());
        let modified = br#"{"type":"checkout.session.completed","hacked":true}"#;
        assert!(!verify_stripe_signature(modified, &header, SECRET, None));
    }

    #[test]
    fn test_stripe_missing_fields() {
        let digest = hmac_sha256_hex(SECRET, BODY);
        assert!(!verify_stripe_signature(
            BODY,
            &format!("v1={digest}"),
            SECRET,
            None
        ));
        assert!(!verify_stripe_signature(
            BODY,
            &format!("t={}", now()),
            SECRET,
            None
        ));
        assert!(!verify_stripe_signature(BODY, "", SECRET, None));
        assert!(!verify_stripe_signature(BODY, "garbage", SECRET, None));
    }

    #[test]
    fn test_stripe_accepts_any_matching_v1() {
        let ts = now();
        let good = sign_stripe_payload(BODY, SECRET, ts);
        let good_digest = good.split_once("v1=").map(|(_, d)| d).unwrap_or_default();
        let header = format!("t={ts},v1={},v1={good_digest},v0=abcd", "00".repeat(32));
        assert!(verify_stripe_signature(BODY, &header, SECRET, None));
    }

    #[test]
    fn test_stripe_old_timestamp_rejected_with_tolerance() {
        let header = sign_stripe_payload(BODY, SECRET, now() - 600);
        assert!(!verify_stripe_signature(BODY, &header, SECRET, Some(300)));
        assert!(verify_stripe_signature(BODY, &header, SECRET, None));
    }

    #[test]
    fn test_stripe_extreme_timestamps_rejected() {
        for ts in [i64::MIN, i64::MIN + 1, i64::MAX] {
            let header = sign_stripe_payload(BODY, SECRET, ts);
            assert!(!verify_stripe_signature(BODY, &header, SECRET, Some(300)));
            assert!(!verify_stripe_signature(
                BODY,
                &format!("t={ts},v1=00"),
                b"s",
                Some(300)
            ));
        }
        let header = sign_stripe_payload(BODY, SECRET, now());
        assert!(!verify_stripe_signature(BODY, &header, SECRET, Some(-1)));
    }

    #[test]
    fn test_coinbase_signature() {
        let header = hmac_sha256_hex(SECRET, BODY);
        assert!(verify_webhook_signature(
            HmacScheme::Coinbase,
            BODY,
            &header,
            SECRET
        ));
        assert!(!verify_coinbase_signature(b"{}", &header, SECRET));
        assert!(!verify_coinbase_signature(BODY, "not-hex", SECRET));
        assert!(!verify_coinbase_signature(BODY, "", SECRET));
    }

    #[test]
    fn test_parse_stripe_header() {
        let parsed = parse_stripe_header("t=1700000000, v1=aa,v0=bb").unwrap();
        assert_eq!(parsed.timestamp, 1_700_000_000);
        assert_eq!(parsed.v1, vec!["aa".to_string()]);
        assert!(parse_stripe_header("t=abc,v1=aa").is_none());
    }
}
