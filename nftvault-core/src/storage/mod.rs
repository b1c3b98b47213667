//! Key-value persistence.
//!
//! [`KvStore`] is the only interface the rest of the engine sees. It exposes
//! the two atomic primitives the lifecycle depends on:
//!
//! * [`KvStore::set_if_absent`] backs the idempotency guard, so two
//!   concurrent deliveries of the same webhook cannot both take the lease.
//! * [`KvStore::compare_and_swap`] backs claim redemption, so two concurrent
//!   redemptions of one claim cannot both succeed.
//!
//! Backends:
//! * [`MemoryKvStore`] – per-instance maps, for development and tests.
//! * [`PgKvStore`] – Postgres through `sqlx`.

mod memory;
mod postgres;
mod repository;

pub use memory::MemoryKvStore;
pub use postgres::PgKvStore;
pub use repository::{OrderPatch, VaultRepository};

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Capacity of the newest-first `orders:list` index.
pub const ORDER_INDEX_CAP: usize = 1000;

/// Capacity of the newest-first `deadletters:list` index.
pub const DEAD_LETTER_INDEX_CAP: usize = 1000;

/// Key layout.
pub mod keys {
    use uuid::Uuid;

    pub const ORDER_INDEX: &str = "orders:list";
    pub const DEAD_LETTER_INDEX: &str = "deadletters:list";

    pub fn order(id: Uuid) -> String {
        format!("order:{id}")
    }

    pub fn claim(id: Uuid) -> String {
        format!("claim:{id}")
    }

    /// Secondary index from a token digest to its claim id.
    pub fn claim_token(token_digest: &str) -> String {
        format!("claim_token:{token_digest}")
    }

    pub fn idempotency(key: &str) -> String {
        format!("idempotency:{key}")
    }

    pub fn dead_letter(id: Uuid) -> String {
        format!("deadletter:{id}")
    }
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An update targeted a record that does not exist
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Asynchronous key-value store with TTLs, atomic primitives and capped lists.
///
/// Expired entries behave exactly like absent ones for every operation.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a value unconditionally, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Write a value only if the key is absent (or expired).
    ///
    /// Returns `true` when this call created the entry.
    async fn set_if_absent(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    /// Replace the value only if it currently equals `expected`.
    ///
    /// The entry keeps its TTL. Returns `true` when the swap happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &Value,
        value: Value,
    ) -> Result<bool, StoreError>;

    /// Remove a key. Returns `true` if something was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Prepend `item` to the list at `key`, keeping at most `cap` items.
    async fn list_push_front(&self, key: &str, item: &str, cap: usize) -> Result<(), StoreError>;

    /// Up to `limit` items from the front of the list at `key`.
    async fn list_range(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError>;
}
