//! Unifies local and remote config sources: writes `ConfigObject`s into the
//! repositories and, for remote sources, drives `InventoryRepo` cleanup
//! first (spec §3, entity `ConfigPopulator`).

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use relay_repository::{AuthRepo, FlagRepo, InventoryRepo, SegmentRepo};
use relay_types::{AssetId, AssetKind, AuthConfig, ConfigObject, EnvironmentId, InventoryRecord, RelayError, RelayResult};
use tracing::warn;

/// Default bounded concurrency for per-environment population (spec §5:
/// "bounded concurrency (default 10) for per-environment tasks").
const DEFAULT_CONCURRENCY: usize = 10;

pub struct ConfigPopulator {
    auth_repo: Arc<AuthRepo>,
    flag_repo: Arc<FlagRepo>,
    segment_repo: Arc<SegmentRepo>,
    inventory_repo: Arc<InventoryRepo>,
    concurrency: usize,
}

impl ConfigPopulator {
    pub fn new(
        auth_repo: Arc<AuthRepo>,
        flag_repo: Arc<FlagRepo>,
        segment_repo: Arc<SegmentRepo>,
        inventory_repo: Arc<InventoryRepo>,
    ) -> Self {
        Self {
            auth_repo,
            flag_repo,
            segment_repo,
            inventory_repo,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Offline-mode entry point: no proxy key, so no inventory tracking —
    /// a directory snapshot has no prior generation to diff against.
    pub async fn populate(&self, objects: Vec<ConfigObject>) -> RelayResult<()> {
        let concurrency = self.concurrency;
        let results: Vec<RelayResult<()>> = stream::iter(objects)
            .map(|object| self.populate_environment(object))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        // First error wins, but every environment still runs to completion
        // (spec §5): buffer_unordered above already drives every task to
        // completion before we inspect results.
        results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
    }

    /// Remote-mode entry point: computes the new inventory for `proxy_key`,
    /// evicts whatever is no longer present, then populates (spec §4.2,
    /// "Inventory cleanup").
    pub async fn populate_with_inventory(&self, proxy_key: &str, objects: Vec<ConfigObject>) -> RelayResult<()> {
        let new_record = inventory_of(&objects);
        let to_remove = self.inventory_repo.cleanup(proxy_key, &new_record).await?;
        self.evict(to_remove).await?;
        self.populate(objects).await
    }

    async fn populate_environment(&self, object: ConfigObject) -> RelayResult<()> {
        let env = object.id.clone();
        let auth_configs = object
            .api_keys
            .iter()
            .map(|raw_key| AuthConfig {
                hashed_api_key: relay_hashing::hash_api_key(raw_key),
                environment: env.clone(),
            });
        self.auth_repo.add(auth_configs).await?;
        self.flag_repo.replace_all(&env, object.feature_configs).await?;
        self.segment_repo.replace_all(&env, object.segments).await?;
        Ok(())
    }

    async fn evict(&self, assets: Vec<AssetId>) -> RelayResult<()> {
        for asset in assets {
            match parse_asset_id(&asset) {
                Ok((env, AssetKind::Flag, identifier)) => self.flag_repo.remove(&env, &identifier).await?,
                Ok((env, AssetKind::Segment, identifier)) => self.segment_repo.remove(&env, &identifier).await?,
                Err(e) => warn!(asset = %asset, error = %e, "skipping malformed asset id during cleanup"),
            }
        }
        Ok(())
    }
}

fn inventory_of(objects: &[ConfigObject]) -> InventoryRecord {
    let mut asset_ids = HashSet::new();
    for object in objects {
        for flag in &object.feature_configs {
            asset_ids.insert(AssetId::new(&object.id, AssetKind::Flag, &flag.identifier));
        }
        for segment in &object.segments {
            asset_ids.insert(AssetId::new(&object.id, AssetKind::Segment, &segment.identifier));
        }
    }
    InventoryRecord::new(asset_ids)
}

fn parse_asset_id(id: &AssetId) -> RelayResult<(EnvironmentId, AssetKind, String)> {
    let mut parts = id.as_str().splitn(3, '/');
    let env = parts.next().ok_or_else(|| RelayError::internal(format!("malformed asset id: {id}")))?;
    let kind = parts.next().ok_or_else(|| RelayError::internal(format!("malformed asset id: {id}")))?;
    let identifier = parts.next().ok_or_else(|| RelayError::internal(format!("malformed asset id: {id}")))?;

    let kind = match kind {
        "flag" => AssetKind::Flag,
        "segment" => AssetKind::Segment,
        other => return Err(RelayError::internal(format!("unknown asset kind: {other}"))),
    };

    Ok((EnvironmentId::new(env), kind, identifier.to_string()))
}

#[cfg(test)]
mod tests {
    use relay_cache::MemoryCache;
    use relay_types::{FlagKind, FlagState, Segment, Variation};

    use super::*;

    fn flag(identifier: &str) -> relay_types::FeatureFlag {
        relay_types::FeatureFlag {
            identifier: identifier.into(),
            kind: FlagKind::Boolean,
            default_serve: Variation {
                identifier: "on".into(),
                value: serde_json::Value::Bool(true),
                name: None,
            },
            off_variation: "off".into(),
            variations: vec![],
            rules: vec![],
            variation_to_target_map: vec![],
            prerequisites: vec![],
            state: FlagState::On,
            version: 1,
        }
    }

    fn segment(identifier: &str) -> Segment {
        Segment {
            identifier: identifier.into(),
            included: vec![],
            excluded: vec![],
            rules: vec![],
            version: 1,
        }
    }

    fn populator() -> ConfigPopulator {
        let cache = Arc::new(MemoryCache::new());
        ConfigPopulator::new(
            Arc::new(AuthRepo::new(cache.clone())),
            Arc::new(FlagRepo::new(cache.clone())),
            Arc::new(SegmentRepo::new(cache.clone())),
            Arc::new(InventoryRepo::new(cache)),
        )
    }

    fn object(env: &str, keys: &[&str], flags: Vec<relay_types::FeatureFlag>, segments: Vec<Segment>) -> ConfigObject {
        ConfigObject {
            id: EnvironmentId::new(env),
            api_keys: keys.iter().map(|k| k.to_string()).collect(),
            feature_configs: flags,
            segments,
        }
    }

    #[tokio::test]
    async fn offline_style_populate_writes_auth_flags_and_segments() {
        let populator = populator();
        let env = EnvironmentId::new("1234");
        populator
            .populate(vec![object("1234", &["key1", "key2"], vec![flag("dark")], vec![segment("team")])])
            .await
            .unwrap();

        assert_eq!(
            populator.auth_repo.find_environment(&relay_hashing::hash_api_key("key1")).await.unwrap(),
            Some(env.clone())
        );
        assert_eq!(populator.flag_repo.get(&env, "dark").await.unwrap(), Some(flag("dark")));
        assert_eq!(populator.segment_repo.get(&env, "team").await.unwrap(), Some(segment("team")));
    }

    #[tokio::test]
    async fn populate_is_idempotent() {
        let populator = populator();
        let objects = || vec![object("e", &["key1"], vec![flag("a")], vec![])];

        populator.populate(objects()).await.unwrap();
        let env = EnvironmentId::new("e");
        let first = populator.flag_repo.get_all_for_environment(&env).await.unwrap();

        populator.populate(objects()).await.unwrap();
        let second = populator.flag_repo.get_all_for_environment(&env).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn inventory_cleanup_evicts_assets_missing_from_new_config() {
        let populator = populator();
        populator
            .populate_with_inventory("proxy-key", vec![object("e", &[], vec![flag("a"), flag("b")], vec![])])
            .await
            .unwrap();

        populator
            .populate_with_inventory("proxy-key", vec![object("e", &[], vec![flag("b")], vec![])])
            .await
            .unwrap();

        let env = EnvironmentId::new("e");
        assert_eq!(populator.flag_repo.get(&env, "a").await.unwrap(), None);
        assert_eq!(populator.flag_repo.get(&env, "b").await.unwrap(), Some(flag("b")));
    }

    proptest::proptest! {
        // spec §8 property 1: populating the same ProxyConfig twice yields the
        // same cache snapshot as populating it once, for any set of flag
        // identifiers (arbitrary, including repeats collapsed by the repo).
        #[test]
        fn populate_is_idempotent_for_any_flag_identifier_set(identifiers in proptest::collection::vec("[a-z]{1,8}", 0..8)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let populator = populator();
                let flags: Vec<_> = identifiers.iter().map(|id| flag(id)).collect();
                let objects = || vec![object("e", &[], flags.clone(), vec![])];
                let env = EnvironmentId::new("e");

                populator.populate(objects()).await.unwrap();
                let first = populator.flag_repo.get_all_for_environment(&env).await.unwrap();

                populator.populate(objects()).await.unwrap();
                let second = populator.flag_repo.get_all_for_environment(&env).await.unwrap();

                prop_assert_eq!(first, second);
                Ok(())
            })?;
        }
    }

    #[tokio::test]
    async fn populate_handles_multiple_environments_concurrently() {
        let populator = populator();
        let objects = (0..20)
            .map(|i| object(&format!("env-{i}"), &[], vec![flag("f")], vec![]))
            .collect();

        populator.populate(objects).await.unwrap();

        for i in 0..20 {
            let env = EnvironmentId::new(format!("env-{i}"));
            assert_eq!(populator.flag_repo.get(&env, "f").await.unwrap(), Some(flag("f")));
        }
    }
}
