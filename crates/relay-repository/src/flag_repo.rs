use std::sync::Arc;

use relay_cache::Cache;
use relay_types::{EnvironmentId, FeatureFlag, RelayResult};

use crate::keys;

/// Owns `env-<envID>/feature-config/<flagIdentifier>` plus the enumeration
/// key `env-<envID>/feature-configs` (spec §4.2).
pub struct FlagRepo {
    cache: Arc<dyn Cache>,
}

impl FlagRepo {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Upserts one or more flags for `env`, replacing the enumeration list
    /// set-wise: identifiers already in the list are kept, new ones are
    /// added. When `flags` repeats an identifier, the last occurrence wins.
    pub async fn add(&self, env: &EnvironmentId, flags: impl IntoIterator<Item = FeatureFlag>) -> RelayResult<()> {
        let mut identifiers = self.list_identifiers(env).await?;
        for flag in flags {
            let key = keys::flag_key(env, &flag.identifier);
            self.cache.set(&key, serde_json::to_vec(&flag)?).await?;
            if !identifiers.contains(&flag.identifier) {
                identifiers.push(flag.identifier);
            }
        }
        self.write_identifiers(env, &identifiers).await
    }

    /// Replaces the full set of flags for `env` atomically with respect to
    /// the enumeration list: used by the populator on a full config reload,
    /// where "atomically" means the list key always reflects exactly the
    /// flags just written, never a stale union with a previous load.
    pub async fn replace_all(&self, env: &EnvironmentId, flags: Vec<FeatureFlag>) -> RelayResult<()> {
        let old_identifiers = self.list_identifiers(env).await?;
        let mut identifiers = Vec::with_capacity(flags.len());
        for flag in flags {
            identifiers.push(flag.identifier.clone());
            let key = keys::flag_key(env, &flag.identifier);
            self.cache.set(&key, serde_json::to_vec(&flag)?).await?;
        }
        for stale in old_identifiers.iter().filter(|id| !identifiers.contains(id)) {
            self.cache.delete(&keys::flag_key(env, stale)).await?;
        }
        self.write_identifiers(env, &identifiers).await
    }

    pub async fn get(&self, env: &EnvironmentId, identifier: &str) -> RelayResult<Option<FeatureFlag>> {
        match self.cache.get(&keys::flag_key(env, identifier)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn get_all_for_environment(&self, env: &EnvironmentId) -> RelayResult<Vec<FeatureFlag>> {
        let mut flags = Vec::new();
        for identifier in self.list_identifiers(env).await? {
            if let Some(flag) = self.get(env, &identifier).await? {
                flags.push(flag);
            }
        }
        Ok(flags)
    }

    pub async fn remove(&self, env: &EnvironmentId, identifier: &str) -> RelayResult<()> {
        self.cache.delete(&keys::flag_key(env, identifier)).await?;
        let mut identifiers = self.list_identifiers(env).await?;
        identifiers.retain(|id| id != identifier);
        self.write_identifiers(env, &identifiers).await
    }

    pub async fn remove_all_for_environment(&self, env: &EnvironmentId) -> RelayResult<()> {
        for identifier in self.list_identifiers(env).await? {
            self.cache.delete(&keys::flag_key(env, &identifier)).await?;
        }
        self.cache.delete(&keys::flag_list_key(env)).await
    }

    async fn list_identifiers(&self, env: &EnvironmentId) -> RelayResult<Vec<String>> {
        match self.cache.get(&keys::flag_list_key(env)).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_identifiers(&self, env: &EnvironmentId, identifiers: &[String]) -> RelayResult<()> {
        self.cache
            .set(&keys::flag_list_key(env), serde_json::to_vec(identifiers)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use relay_cache::MemoryCache;
    use relay_types::{FlagKind, FlagState, Variation};

    use super::*;

    fn repo() -> FlagRepo {
        FlagRepo::new(Arc::new(MemoryCache::new()))
    }

    fn flag(identifier: &str) -> FeatureFlag {
        FeatureFlag {
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

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let repo = repo();
        let env = EnvironmentId::new("1234");
        repo.add(&env, [flag("dark")]).await.unwrap();

        assert_eq!(repo.get(&env, "dark").await.unwrap(), Some(flag("dark")));
        assert_eq!(
            repo.get_all_for_environment(&env).await.unwrap(),
            vec![flag("dark")]
        );
    }

    #[tokio::test]
    async fn replace_all_is_idempotent() {
        let repo = repo();
        let env = EnvironmentId::new("e");
        repo.replace_all(&env, vec![flag("a"), flag("b")]).await.unwrap();
        let first: Vec<_> = repo.get_all_for_environment(&env).await.unwrap();

        repo.replace_all(&env, vec![flag("a"), flag("b")]).await.unwrap();
        let second: Vec<_> = repo.get_all_for_environment(&env).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn replace_all_evicts_flags_missing_from_new_set() {
        let repo = repo();
        let env = EnvironmentId::new("e");
        repo.replace_all(&env, vec![flag("a"), flag("b")]).await.unwrap();
        repo.replace_all(&env, vec![flag("b")]).await.unwrap();

        assert_eq!(repo.get(&env, "a").await.unwrap(), None);
        assert_eq!(repo.get(&env, "b").await.unwrap(), Some(flag("b")));
    }

    #[tokio::test]
    async fn remove_all_for_environment_cascades() {
        let repo = repo();
        let env = EnvironmentId::new("e");
        repo.add(&env, [flag("a"), flag("b")]).await.unwrap();
        repo.remove_all_for_environment(&env).await.unwrap();

        assert_eq!(repo.get_all_for_environment(&env).await.unwrap(), vec![]);
    }
}
