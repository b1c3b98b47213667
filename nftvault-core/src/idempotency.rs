//! Exactly-once application of side effects under at-least-once delivery.
//!
//! A logical operation is named by a deterministic key, `"{action}:{order_id}"`.
//! The key never contains a timestamp: two deliveries of the same webhook must
//! collapse onto the same key.
//!
//! Protocol:
//!
//! 1. [`IdempotencyGuard::begin`] atomically creates a short-lived lease
//!    record (`processed = false`) with `set_if_absent`. Only one caller can
//!    win it.
//! 2. The winner applies the mutation, then calls [`IdempotencyGuard::record`]
//!    which overwrites the lease with `processed = true` and the result, kept
//!    for 24 hours.
//! 3. If the mutation fails the winner calls [`IdempotencyGuard::abandon`] so
//!    a retry is not blocked until the lease expires.
//!
//! Losers either replay the cached result or, while the winner is still
//! running, are told the operation is in flight.

use crate::entities::IdempotencyRecord;
use crate::storage::{KvStore, StoreError, keys};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// How long a processed record is kept.
pub const RECORD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// How long an in-flight lease blocks other callers if its owner dies.
pub const LEASE_TTL: Duration = Duration::from_secs(60);

/// Deterministic key for `action` applied to `order_id`.
pub fn idempotency_key(action: &str, order_id: Uuid) -> String {
    format!("{action}:{order_id}")
}

/// Result of [`IdempotencyGuard::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The caller owns the key and must apply the operation.
    Proceed,
    /// Already applied; this is the cached result.
    Replay(Value),
    /// Another caller holds the lease right now.
    InFlight,
}

/// Deduplicates side-effecting operations by key.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn KvStore>,
    record_ttl: Duration,
    lease_ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            record_ttl: RECORD_TTL,
            lease_ttl: LEASE_TTL,
        }
    }

    pub fn with_lease_ttl(mut self, lease_ttl: Duration) -> Self {
        self.lease_ttl = lease_ttl;
        self
    }

    /// Look up the record for `key`, processed or not.
    pub async fn check(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        match self.store.get(&keys::idempotency(key)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Atomically claim `key`, or report why the caller must not proceed.
    pub async fn begin(&self, key: &str, now_ms: i64) -> Result<Admission, StoreError> {
        let lease = IdempotencyRecord {
            key: key.to_owned(),
            processed: false,
            result: None,
            created_at: now_ms,
        };
        let acquired = self
            .store
            .set_if_absent(
                &keys::idempotency(key),
                serde_json::to_value(&lease)?,
                Some(self.lease_ttl),
            )
            .await?;
        if acquired {
            debug!(key, "Idempotency lease acquired");
            return Ok(Admission::Proceed);
        }

        match self.check(key).await? {
            Some(IdempotencyRecord {
                processed: true,
                result,
                ..
            }) => {
                debug!(key, "Replaying processed operation");
                Ok(Admission::Replay(result.unwrap_or(Value::Null)))
            }
            Some(_) => Ok(Admission::InFlight),
            // The lease expired between the two calls; one more attempt.
            None => {
                let acquired = self
                    .store
                    .set_if_absent(
                        &keys::idempotency(key),
                        serde_json::to_value(&lease)?,
                        Some(self.lease_ttl),
                    )
                    .await?;
                Ok(if acquired {
                    Admission::Proceed
                } else {
                    Admission::InFlight
                })
            }
        }
    }

    /// Mark `key` as processed with `result`.
    pub async fn record<T: Serialize>(
        &self,
        key: &str,
        result: &T,
        now_ms: i64,
    ) -> Result<(), StoreError> {
        let record = IdempotencyRecord {
            key: key.to_owned(),
            processed: true,
            result: Some(serde_json::to_value(result)?),
            created_at: now_ms,
        };
        self.store
            .set(
                &keys::idempotency(key),
                serde_json::to_value(&record)?,
                Some(self.record_ttl),
            )
            .await
    }

    /// Release the lease on `key` after a failed attempt.
    ///
    /// A processed record is never removed.
    pub async fn abandon(&self, key: &str) {
        match self.check(key).await {
            Ok(Some(record)) if !record.processed => {
                if let Err(e) = self.store.delete(&keys::idempotency(key)).await {
                    warn!(key, error = %e, "Failed to release idempotency lease");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(key, error = %e, "Failed to read idempotency lease"),
        }
    }
}
