//! Typed access to orders, claims and dead letters on top of a [`KvStore`].

use super::{DEAD_LETTER_INDEX_CAP, KvStore, ORDER_INDEX_CAP, StoreError, keys};
use crate::entities::{Claim, DeadLetter, Order};
use nftvault_sdk::objects::{OrderStatus, ProviderKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// A merge patch for [`VaultRepository::update_order`].
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub wallet_address: Option<String>,
    pub payment_provider: Option<ProviderKind>,
    pub payment_id: Option<String>,
    pub checkout_attempts: Option<u8>,
    pub mint_tx_hash: Option<String>,
}

impl OrderPatch {
    fn apply(self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(wallet) = self.wallet_address {
            order.wallet_address = Some(wallet);
        }
        if let Some(provider) = self.payment_provider {
            order.payment_provider = Some(provider);
        }
        if let Some(payment_id) = self.payment_id {
            order.payment_id = Some(payment_id);
        }
        if let Some(attempts) = self.checkout_attempts {
            order.checkout_attempts = attempts;
        }
        if let Some(tx_hash) = self.mint_tx_hash {
            order.mint_tx_hash = Some(tx_hash);
        }
    }
}

/// Order / claim persistence used by the lifecycle coordinator.
///
/// Cheap to clone; all clones share the same store.
#[derive(Clone)]
pub struct VaultRepository {
    store: Arc<dyn KvStore>,
}

impl VaultRepository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// The underlying store, shared with the idempotency guard.
    pub fn store(&self) -> Arc<dyn KvStore> {
        Arc::clone(&self.store)
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.store.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn save<T: Serialize>(&self, key: &str, record: &T) -> Result<(), StoreError> {
        self.store.set(key, serde_json::to_value(record)?, None).await
    }

    // -- orders -------------------------------------------------------------

    /// Persist a new order and put it at the front of the listing index.
    pub async fn store_order(&self, order: &Order) -> Result<(), StoreError> {
        self.save(&keys::order(order.id), order).await?;
        // The index is best-effort; the order record is authoritative.
        if let Err(e) = self
            .store
            .list_push_front(keys::ORDER_INDEX, &order.id.to_string(), ORDER_INDEX_CAP)
            .await
        {
            warn!(order_id = %order.id, error = %e, "Failed to index order");
        }
        Ok(())
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        self.load(&keys::order(id)).await
    }

    /// Merge `patch` into an existing order and bump `updated_at`.
    ///
    /// Last writer wins: concurrent patches of one order are not merged
    /// field by field.
    pub async fn update_order(
        &self,
        id: Uuid,
        patch: OrderPatch,
        now_ms: i64,
    ) -> Result<Order, StoreError> {
        let mut order: Order = self
            .load(&keys::order(id))
            .await?
            .ok_or_else(|| StoreError::NotFound(keys::order(id)))?;
        patch.apply(&mut order);
        order.updated_at = now_ms.max(order.updated_at);
        self.save(&keys::order(id), &order).await?;
        debug!(order_id = %id, status = %order.status, "Order updated");
        Ok(order)
    }

    /// Apply `patch` only if the stored order still equals `current`.
    ///
    /// Returns `None` when another writer changed the order since `current`
    /// was read, so checks made against `current` no longer hold.
    pub async fn swap_order(
        &self,
        current: &Order,
        patch: OrderPatch,
        now_ms: i64,
    ) -> Result<Option<Order>, StoreError> {
        let mut next = current.clone();
        patch.apply(&mut next);
        next.updated_at = now_ms.max(current.updated_at);
        let swapped = self
            .store
            .compare_and_swap(
                &keys::order(current.id),
                &serde_json::to_value(current)?,
                serde_json::to_value(&next)?,
            )
            .await?;
        if !swapped {
            debug!(order_id = %current.id, "Order changed concurrently");
            return Ok(None);
        }
        Ok(Some(next))
    }

    /// Up to `limit` orders, newest first. Index entries whose record is
    /// gone are skipped.
    pub async fn get_recent_orders(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let ids = self.store.list_range(keys::ORDER_INDEX, limit).await?;
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            let Ok(id) = id.parse::<Uuid>() else {
                continue;
            };
            if let Some(order) = self.get_order(id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    // -- claims -------------------------------------------------------------

    /// Persist a claim together with its token index entry.
    pub async fn store_claim(&self, claim: &Claim) -> Result<(), StoreError> {
        self.save(&keys::claim(claim.id), claim).await?;
        self.store
            .set(
                &keys::claim_token(&token_digest(&claim.token)),
                serde_json::Value::String(claim.id.to_string()),
                None,
            )
            .await
    }

    pub async fn get_claim(&self, id: Uuid) -> Result<Option<Claim>, StoreError> {
        self.load(&keys::claim(id)).await
    }

    pub async fn get_claim_by_token(&self, token: &str) -> Result<Option<Claim>, StoreError> {
        let Some(claim_id) = self
            .store
            .get(&keys::claim_token(&token_digest(token)))
            .await?
        else {
            return Ok(None);
        };
        let Some(claim_id) = claim_id.as_str().and_then(|s| s.parse::<Uuid>().ok()) else {
            warn!("Malformed claim token index entry");
            return Ok(None);
        };
        let claim = self.get_claim(claim_id).await?;
        // Guard against a stale index entry pointing at another token's claim.
        Ok(claim.filter(|claim| claim.token == token))
    }

    /// Overwrite a claim unconditionally.
    pub async fn update_claim(&self, claim: &Claim) -> Result<(), StoreError> {
        self.save(&keys::claim(claim.id), claim).await
    }

    /// Atomically replace `current` with `consumed`.
    ///
    /// Returns `false` if the stored claim no longer equals `current`, i.e.
    /// another redemption got there first.
    pub async fn consume_claim(&self, current: &Claim, consumed: &Claim) -> Result<bool, StoreError> {
        self.store
            .compare_and_swap(
                &keys::claim(current.id),
                &serde_json::to_value(current)?,
                serde_json::to_value(consumed)?,
            )
            .await
    }

    // -- dead letters -------------------------------------------------------

    pub async fn store_dead_letter(&self, letter: &DeadLetter) -> Result<(), StoreError> {
        self.save(&keys::dead_letter(letter.id), letter).await?;
        self.store
            .list_push_front(
                keys::DEAD_LETTER_INDEX,
                &letter.id.to_string(),
                DEAD_LETTER_INDEX_CAP,
            )
            .await
    }

    pub async fn recent_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, StoreError> {
        let ids = self.store.list_range(keys::DEAD_LETTER_INDEX, limit).await?;
        let mut letters = Vec::with_capacity(ids.len());
        for id in ids {
            let Ok(id) = id.parse::<Uuid>() else {
                continue;
            };
            if let Some(letter) = self.load(&keys::dead_letter(id)).await? {
                letters.push(letter);
            }
        }
        Ok(letters)
    }
}

/// SHA-256 of a token, hex encoded. Used as the token index key so raw
/// tokens never appear in key names.
pub fn token_digest(token: &str) -> String {
    hex::encode(ring::digest::digest(&ring::digest::SHA256, token.as_bytes()).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::NewOrder;
    use crate::storage::MemoryKvStore;
    use nftvault_sdk::objects::ClaimStatus;
    use rust_decimal::Decimal;

    fn repo() -> VaultRepository {
        VaultRepository::new(Arc::new(MemoryKvStore::new()))
    }

    fn order(now: i64) -> Order {
        Order::new(
            NewOrder {
                wallet_address: None,
                amount: Decimal::new(4900, 2),
                currency: "USD".into(),
                description: "Vault NFT".into(),
                payment_provider: ProviderKind::Stripe,
            },
            now,
        )
    }

    #[tokio::test]
    async fn test_update_order_merges_and_bumps_updated_at() {
        let repo = repo();
        let order = order(1_000);
        repo.store_order(&order).await.unwrap();

        let updated = repo
            .update_order(
                order.id,
                OrderPatch {
                    status: Some(OrderStatus::Paid),
                    payment_id: Some("cs_123".into()),
                    ..Default::default()
                },
                2_000,
            )
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Paid);
        assert_eq!(updated.payment_id.as_deref(), Some("cs_123"));
        assert_eq!(updated.currency, "USD");
        assert_eq!(updated.created_at, 1_000);
        assert_eq!(updated.updated_at, 2_000);
        assert_eq!(repo.get_order(order.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_swap_order_applies_against_current_only() {
        let repo = repo();
        let order = order(1_000);
        repo.store_order(&order).await.unwrap();

        let patch = OrderPatch {
            checkout_attempts: Some(2),
            payment_provider: Some(ProviderKind::Coinbase),
            ..Default::default()
        };
        let swapped = repo
            .swap_order(&order, patch.clone(), 2_000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(swapped.checkout_attempts, 2);
        assert_eq!(swapped.updated_at, 2_000);

        // The snapshot is stale now; a second swap from it must not land.
        assert!(repo.swap_order(&order, patch, 3_000).await.unwrap().is_none());
        assert_eq!(repo.get_order(order.id).await.unwrap(), Some(swapped));
    }

    #[tokio::test]
    async fn test_update_missing_order_is_not_found() {
        let err = repo()
            .update_order(Uuid::new_v4(), OrderPatch::default(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_recent_orders_newest_first() {
        let repo = repo();
        let mut ids = Vec::new();
        for i in 0..3 {
            let order = order(i);
            ids.push(order.id);
            repo.store_order(&order).await.unwrap();
        }
        let recent = repo.get_recent_orders(2).await.unwrap();
        assert_eq!(
            recent.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![ids[2], ids[1]]
        );
    }

    #[tokio::test]
    async fn test_claim_lookup_by_token_and_consume_once() {
        let repo = repo();
        let claim = Claim::new(Uuid::new_v4(), "token-abc".into(), 10);
        repo.store_claim(&claim).await.unwrap();

        let found = repo.get_claim_by_token("token-abc").await.unwrap().unwrap();
        assert_eq!(found, claim);
        assert!(repo.get_claim_by_token("token-xyz").await.unwrap().is_none());

        let consumed = found.consumed(20, "mint-sig".into(), "0xabc".into());
        assert!(repo.consume_claim(&found, &consumed).await.unwrap());
        assert!(!repo.consume_claim(&found, &consumed).await.unwrap());

        let stored = repo.get_claim(claim.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ClaimStatus::Consumed);
        assert_eq!(stored.consumed_at, Some(20));
    }

    #[tokio::test]
    async fn test_dead_letters_round_trip() {
        let repo = repo();
        let letter = DeadLetter::new(ProviderKind::Coinbase, "order not found".into(), b"{}", 5);
        repo.store_dead_letter(&letter).await.unwrap();
        assert_eq!(repo.recent_dead_letters(10).await.unwrap(), vec![letter]);
    }
}
