use async_trait::async_trait;
use dashmap::DashMap;
use relay_types::RelayResult;

use crate::Cache;

/// Process-local backend. `DashMap` already shards its internal locking, so
/// this mirrors the teacher's `MemoryProvider` (`data_sources/memory_provider.rs`)
/// rather than wrapping a single `Mutex<HashMap<..>>` around the whole store.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> RelayResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> RelayResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> RelayResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> RelayResult<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    async fn health_check(&self) -> RelayResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = MemoryCache::new();
        cache.set("k", b"v".to_vec()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found_not_error() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let cache = MemoryCache::new();
        cache.set("k", b"v".to_vec()).await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_is_bounded_by_prefix() {
        let cache = MemoryCache::new();
        cache.set("env-1/a", vec![]).await.unwrap();
        cache.set("env-1/b", vec![]).await.unwrap();
        cache.set("env-2/a", vec![]).await.unwrap();

        let mut keys = cache.scan("env-1/").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["env-1/a".to_string(), "env-1/b".to_string()]);
    }
}
