//! In-memory [`KvStore`] backend.

use super::{KvStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// A [`KvStore`] held entirely in process memory.
///
/// Every instance owns its own maps; nothing is shared between instances.
/// Expired entries are dropped lazily when touched.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Entry>>,
    lists: RwLock<HashMap<String, VecDeque<String>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_owned(), Entry::new(value, ttl));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        entries.insert(key.to_owned(), Entry::new(value, ttl));
        Ok(true)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &Value,
        value: Value,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) && entry.value == *expected => {
                entry.value = value;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key).is_some_and(|entry| entry.is_live(now)))
    }

    async fn list_push_front(&self, key: &str, item: &str, cap: usize) -> Result<(), StoreError> {
        let mut lists = self.lists.write().await;
        let list = lists.entry(key.to_owned()).or_default();
        list.push_front(item.to_owned());
        list.truncate(cap);
        Ok(())
    }

    async fn list_range(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let lists = self.lists.read().await;
        Ok(lists
            .get(key)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", json!({"x": 1}), None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!({"x": 1})));
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryKvStore::new();
        store
            .set("short", json!(1), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(store.get("short").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get("short").await.unwrap().is_none());
        // An expired key counts as absent.
        assert!(store.set_if_absent("short", json!(2), None).await.unwrap());
        assert_eq!(store.get("short").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_set_if_absent_single_winner() {
        let store = Arc::new(MemoryKvStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.set_if_absent("lease", json!(i), None).await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = MemoryKvStore::new();
        store.set("c", json!({"status": "active"}), None).await.unwrap();
        assert!(
            !store
                .compare_and_swap("c", &json!({"status": "other"}), json!({"status": "x"}))
                .await
                .unwrap()
        );
        assert!(
            store
                .compare_and_swap(
                    "c",
                    &json!({"status": "active"}),
                    json!({"status": "consumed"})
                )
                .await
                .unwrap()
        );
        assert!(
            !store
                .compare_and_swap(
                    "c",
                    &json!({"status": "active"}),
                    json!({"status": "consumed"})
                )
                .await
                .unwrap()
        );
        assert!(
            !store
                .compare_and_swap("missing", &json!(null), json!(1))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_capped_list_is_newest_first() {
        let store = MemoryKvStore::new();
        for i in 0..5 {
            store.list_push_front("l", &i.to_string(), 3).await.unwrap();
        }
        assert_eq!(store.list_range("l", 10).await.unwrap(), vec!["4", "3", "2"]);
        assert_eq!(store.list_range("l", 1).await.unwrap(), vec!["4"]);
        assert!(store.list_range("empty", 10).await.unwrap().is_empty());
    }
}
