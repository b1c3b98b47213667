//! Shared types for the NFT vault lifecycle engine.
//!
//! * [`objects`] – request/response bodies of the HTTP API.
//! * [`signature`] – HMAC-SHA256 webhook signature schemes of the payment providers.
//! * [`token`] – the signed claim / mint token format.

#![forbid(unsafe_code)]

pub mod objects;
pub mod signature;
pub mod token;

/// Current wall-clock time as unix milliseconds.
pub fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
