use std::sync::Arc;

use relay_cache::Cache;
use relay_types::{AssetId, InventoryRecord, RelayResult};

use crate::keys;

/// Owns the `inventory/<proxyKey>/assets` key (spec §3, §4.2): the record of
/// which assets a proxy key currently caches, used to evict stale assets on
/// every populate cycle.
pub struct InventoryRepo {
    cache: Arc<dyn Cache>,
}

impl InventoryRepo {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub async fn get(&self, proxy_key: &str) -> RelayResult<InventoryRecord> {
        match self.cache.get(&keys::inventory_key(proxy_key)).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(InventoryRecord::default()),
        }
    }

    /// Computes `storedAssetIDs \ newAssetIDs`, persists `new` as the
    /// inventory of record, and hands back the assets the caller must now
    /// evict from `FlagRepo`/`SegmentRepo`. Does not delete the flag/segment
    /// entries itself: this repo only tracks asset identity, not the asset
    /// stores, and the caller (the populator) already knows which repo each
    /// `AssetKind` maps to.
    pub async fn cleanup(&self, proxy_key: &str, new: &InventoryRecord) -> RelayResult<Vec<AssetId>> {
        let old = self.get(proxy_key).await?;
        let to_remove: Vec<AssetId> = old.to_remove(new).cloned().collect();
        self.cache
            .set(&keys::inventory_key(proxy_key), serde_json::to_vec(new)?)
            .await?;
        Ok(to_remove)
    }

    pub async fn remove(&self, proxy_key: &str) -> RelayResult<()> {
        self.cache.delete(&keys::inventory_key(proxy_key)).await
    }
}
