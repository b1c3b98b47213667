//! Postgres [`KvStore`] backend.
//!
//! Schema (see `migrations/`):
//!
//! ```text
//! kv_entries    (key TEXT PRIMARY KEY, value JSONB, expires_at TIMESTAMPTZ NULL)
//! kv_list_items (list_key TEXT, position BIGSERIAL, item TEXT)
//! ```
//!
//! `set_if_absent` is a single `INSERT … ON CONFLICT` statement and
//! `compare_and_swap` a single conditional `UPDATE`, so both are atomic
//! across every server instance sharing the database.

use super::{KvStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;
use std::time::Duration;
use time::OffsetDateTime;

/// A [`KvStore`] backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgKvStore {
    pool: PgPool,
}

impl PgKvStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete every expired entry. Reads already ignore them; this only
    /// reclaims space.
    #[tracing::instrument(skip_all, err, name = "SQL:PurgeExpiredKvEntries")]
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM kv_entries
            WHERE expires_at IS NOT NULL AND expires_at <= now()
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn expiry(ttl: Option<Duration>) -> Option<OffsetDateTime> {
    ttl.map(|ttl| OffsetDateTime::now_utc() + ttl)
}

#[async_trait]
impl KvStore for PgKvStore {
    #[tracing::instrument(skip_all, err, name = "SQL:KvGet")]
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let value = sqlx::query_scalar::<_, Json<Value>>(
            r#"
            SELECT value FROM kv_entries
            WHERE key = $1
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value.map(|Json(v)| v))
    }

    #[tracing::instrument(skip_all, err, name = "SQL:KvSet")]
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(Json(value))
        .bind(expiry(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, err, name = "SQL:KvSetIfAbsent")]
    async fn set_if_absent(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        // An expired row is taken over in place; a live one makes the
        // conflict branch a no-op and RETURNING yields nothing.
        let inserted = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO kv_entries (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            WHERE kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= now()
            RETURNING key
            "#,
        )
        .bind(key)
        .bind(Json(value))
        .bind(expiry(ttl))
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted.is_some())
    }

    #[tracing::instrument(skip_all, err, name = "SQL:KvCompareAndSwap")]
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &Value,
        value: Value,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE kv_entries
            SET value = $3
            WHERE key = $1
              AND value = $2
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(key)
        .bind(Json(expected))
        .bind(Json(value))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip_all, err, name = "SQL:KvDelete")]
    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM kv_entries
            WHERE key = $1
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip_all, err, name = "SQL:KvListPushFront")]
    async fn list_push_front(&self, key: &str, item: &str, cap: usize) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO kv_list_items (list_key, item)
            VALUES ($1, $2)
            "#,
        )
        .bind(key)
        .bind(item)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM kv_list_items
            WHERE list_key = $1
              AND position NOT IN (
                SELECT position FROM kv_list_items
                WHERE list_key = $1
                ORDER BY position DESC
                LIMIT $2
              )
            "#,
        )
        .bind(key)
        .bind(cap as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, err, name = "SQL:KvListRange")]
    async fn list_range(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let items = sqlx::query_scalar::<_, String>(
            r#"
            SELECT item FROM kv_list_items
            WHERE list_key = $1
            ORDER BY position DESC
            LIMIT $2
            "#,
        )
        .bind(key)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}
