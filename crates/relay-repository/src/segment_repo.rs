use std::sync::Arc;

use relay_cache::Cache;
use relay_types::{EnvironmentId, RelayResult, Segment};

use crate::keys;

/// Owns `env-<envID>/target-segments/<segmentIdentifier>` plus the
/// enumeration key `env-<envID>/target-segments` (spec §4.2). Mirrors
/// `FlagRepo` exactly; segments and flags are both "a list of identified,
/// versioned records scoped to an environment", just with a different key
/// prefix.
pub struct SegmentRepo {
    cache: Arc<dyn Cache>,
}

impl SegmentRepo {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub async fn add(&self, env: &EnvironmentId, segments: impl IntoIterator<Item = Segment>) -> RelayResult<()> {
        let mut identifiers = self.list_identifiers(env).await?;
        for segment in segments {
            let key = keys::segment_key(env, &segment.identifier);
            self.cache.set(&key, serde_json::to_vec(&segment)?).await?;
            if !identifiers.contains(&segment.identifier) {
                identifiers.push(segment.identifier);
            }
        }
        self.write_identifiers(env, &identifiers).await
    }

    pub async fn replace_all(&self, env: &EnvironmentId, segments: Vec<Segment>) -> RelayResult<()> {
        let old_identifiers = self.list_identifiers(env).await?;
        let mut identifiers = Vec::with_capacity(segments.len());
        for segment in segments {
            identifiers.push(segment.identifier.clone());
            let key = keys::segment_key(env, &segment.identifier);
            self.cache.set(&key, serde_json::to_vec(&segment)?).await?;
        }
        for stale in old_identifiers.iter().filter(|id| !identifiers.contains(id)) {
            self.cache.delete(&keys::segment_key(env, stale)).await?;
        }
        self.write_identifiers(env, &identifiers).await
    }

    pub async fn get(&self, env: &EnvironmentId, identifier: &str) -> RelayResult<Option<Segment>> {
        match self.cache.get(&keys::segment_key(env, identifier)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn get_all_for_environment(&self, env: &EnvironmentId) -> RelayResult<Vec<Segment>> {
        let mut segments = Vec::new();
        for identifier in self.list_identifiers(env).await? {
            if let Some(segment) = self.get(env, &identifier).await? {
                segments.push(segment);
            }
        }
        Ok(segments)
    }

    pub async fn remove(&self, env: &EnvironmentId, identifier: &str) -> RelayResult<()> {
        self.cache.delete(&keys::segment_key(env, identifier)).await?;
        let mut identifiers = self.list_identifiers(env).await?;
        identifiers.retain(|id| id != identifier);
        self.write_identifiers(env, &identifiers).await
    }

    pub async fn remove_all_for_environment(&self, env: &EnvironmentId) -> RelayResult<()> {
        for identifier in self.list_identifiers(env).await? {
            self.cache.delete(&keys::segment_key(env, &identifier)).await?;
        }
        self.cache.delete(&keys::segment_list_key(env)).await
    }

    async fn list_identifiers(&self, env: &EnvironmentId) -> RelayResult<Vec<String>> {
        match self.cache.get(&keys::segment_list_key(env)).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_identifiers(&self, env: &EnvironmentId, identifiers: &[String]) -> RelayResult<()> {
        self.cache
            .set(&keys::segment_list_key(env), serde_json::to_vec(identifiers)?)
            .await
    }
}
