//! Order, payment and claim lifecycle engine of the NFT vault.
//!
//! * [`storage`] – key-value persistence with the atomic primitives the
//!   lifecycle depends on, plus the typed [`storage::VaultRepository`].
//! * [`idempotency`] – exactly-once side effects under at-least-once delivery.
//! * [`tokens`] – claim tokens and mint signatures.
//! * [`providers`] – Stripe, Coinbase Commerce and PayPal checkout adapters.
//! * [`webhooks`] – provider webhook authentication and event parsing.
//! * [`lifecycle`] – the coordinator that ties them together.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod entities;
pub mod idempotency;
pub mod lifecycle;
pub mod providers;
pub mod storage;
pub mod tokens;
pub mod webhooks;
