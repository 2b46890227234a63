use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::ids::AssetId;

/// The proxy's persistent record of which assets it currently caches for a
/// given proxy key, used to drive eviction on reload (spec §3, §4.2).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub asset_ids: HashSet<AssetId>,
}

impl InventoryRecord {
    pub fn new(asset_ids: HashSet<AssetId>) -> Self {
        Self { asset_ids }
    }

    /// `storedAssetIDs \ newAssetIDs` — the assets to remove before writing
    /// the new set (spec §4.2).
    pub fn to_remove<'a>(&'a self, new: &'a InventoryRecord) -> impl Iterator<Item = &'a AssetId> {
        self.asset_ids.difference(&new.asset_ids)
    }
}
