use std::sync::Arc;

use relay_cache::Cache;
use relay_types::{AuthConfig, EnvironmentId, RelayResult};

use crate::keys;

/// Owns the `auth-env-<envID>/key-<hashedAPIKey>` key schema (spec §4.2).
pub struct AuthRepo {
    cache: Arc<dyn Cache>,
}

impl AuthRepo {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Upserts one or more entries. When two entries in the same call share
    /// a key, the last one wins (spec §4.2 ordering rule) because later
    /// writes simply overwrite earlier ones as the loop proceeds in order.
    pub async fn add(&self, configs: impl IntoIterator<Item = AuthConfig>) -> RelayResult<()> {
        for config in configs {
            let key = keys::auth_key(&config.environment, &config.hashed_api_key);
            let bytes = serde_json::to_vec(&config.environment)?;
            self.cache.set(&key, bytes).await?;
        }
        Ok(())
    }

    /// Resolves a hashed API key to its environment, the lookup `TokenSource`
    /// performs on every `GenerateToken` call.
    pub async fn get(&self, hashed_api_key: &str, env: &EnvironmentId) -> RelayResult<Option<EnvironmentId>> {
        let key = keys::auth_key(env, hashed_api_key);
        match self.cache.get(&key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Looks up a hashed API key without knowing its environment ahead of
    /// time, by scanning every environment's auth namespace. Used by
    /// `TokenSource::generate_token`, which only has the raw API key.
    pub async fn find_environment(&self, hashed_api_key: &str) -> RelayResult<Option<EnvironmentId>> {
        let candidates = self.cache.scan("auth-env-").await?;
        for key in candidates {
            if key.ends_with(&format!("/key-{hashed_api_key}")) {
                if let Some(bytes) = self.cache.get(&key).await? {
                    return Ok(Some(serde_json::from_slice(&bytes)?));
                }
            }
        }
        Ok(None)
    }

    /// Every environment with at least one cached auth entry, deduplicated.
    /// Used at startup to decide which environments need an `EventListener`
    /// (spec §4.6: "one connection per API key" — one per environment here,
    /// since the upstream connection authenticates the environment itself).
    pub async fn known_environments(&self) -> RelayResult<Vec<EnvironmentId>> {
        let mut environments = Vec::new();
        for key in self.cache.scan("auth-env-").await? {
            if let Some(bytes) = self.cache.get(&key).await? {
                let env: EnvironmentId = serde_json::from_slice(&bytes)?;
                if !environments.contains(&env) {
                    environments.push(env);
                }
            }
        }
        Ok(environments)
    }

    pub async fn remove(&self, env: &EnvironmentId, hashed_api_key: &str) -> RelayResult<()> {
        self.cache.delete(&keys::auth_key(env, hashed_api_key)).await
    }

    pub async fn remove_all_for_environment(&self, env: &EnvironmentId) -> RelayResult<()> {
        let prefix = keys::auth_scan_prefix(env);
        for key in self.cache.scan(&prefix).await? {
            self.cache.delete(&key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use relay_cache::MemoryCache;

    use super::*;

    fn repo() -> AuthRepo {
        AuthRepo::new(Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let repo = repo();
        let env = EnvironmentId::new("1234");
        repo.add([AuthConfig {
            hashed_api_key: "hashedkey1".into(),
            environment: env.clone(),
        }])
        .await
        .unwrap();

        assert_eq!(
            repo.get("hashedkey1", &env).await.unwrap(),
            Some(env.clone())
        );
        assert_eq!(repo.find_environment("hashedkey1").await.unwrap(), Some(env));
    }

    #[tokio::test]
    async fn last_entry_with_same_key_wins() {
        let repo = repo();
        let env_a = EnvironmentId::new("a");
        let env_b = EnvironmentId::new("b");
        repo.add([
            AuthConfig {
                hashed_api_key: "k".into(),
                environment: env_a,
            },
            AuthConfig {
                hashed_api_key: "k".into(),
                environment: env_b.clone(),
            },
        ])
        .await
        .unwrap();

        assert_eq!(repo.find_environment("k").await.unwrap(), Some(env_b));
    }

    #[tokio::test]
    async fn remove_all_for_environment_cascades() {
        let repo = repo();
        let env = EnvironmentId::new("e");
        repo.add([
            AuthConfig {
                hashed_api_key: "k1".into(),
                environment: env.clone(),
            },
            AuthConfig {
                hashed_api_key: "k2".into(),
                environment: env.clone(),
            },
        ])
        .await
        .unwrap();

        repo.remove_all_for_environment(&env).await.unwrap();

        assert_eq!(repo.find_environment("k1").await.unwrap(), None);
        assert_eq!(repo.find_environment("k2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn known_environments_deduplicates_across_keys() {
        let repo = repo();
        let env_a = EnvironmentId::new("a");
        let env_b = EnvironmentId::new("b");
        repo.add([
            AuthConfig {
                hashed_api_key: "k1".into(),
                environment: env_a.clone(),
            },
            AuthConfig {
                hashed_api_key: "k2".into(),
                environment: env_a.clone(),
            },
            AuthConfig {
                hashed_api_key: "k3".into(),
                environment: env_b.clone(),
            },
        ])
        .await
        .unwrap();

        let mut environments = repo.known_environments().await.unwrap();
        environments.sort();
        assert_eq!(environments, vec![env_a, env_b]);
    }
}
