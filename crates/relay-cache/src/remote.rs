use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use async_trait::async_trait;
use relay_types::RelayResult;

use crate::Cache;

/// Remote shared-store backend. Built on `redis::aio::ConnectionManager`,
/// which pipelines commands over a single multiplexed connection and
/// reconnects transparently on failure — the same "pipelined commands and
/// transparent reconnect" contract spec §4.1 asks for, without us having to
/// hand-roll the retry loop the teacher's `RwLock<Client>` pattern uses in
/// `persistence/redis.rs`.
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> RelayResult<Self> {
        let client = redis::Client::open(url).map_err(to_relay_error)?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(to_relay_error)?;
        Ok(Self { manager })
    }

    /// Exposes a fresh multiplexed connection so `relay-stream`'s remote
    /// backend can drive Redis pub/sub off the same connection parameters,
    /// without `relay-cache` needing to know about topics or subscriptions.
    pub fn connection_manager(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

fn to_relay_error(err: redis::RedisError) -> relay_types::RelayError {
    if err.is_connection_refusal() || err.is_timeout() || err.is_connection_dropped() {
        relay_types::RelayError::transient(format!("redis: {err}"))
    } else {
        relay_types::RelayError::internal(format!("redis: {err}"))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> RelayResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(to_relay_error)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> RelayResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.set(key, value).await.map_err(to_relay_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> RelayResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await.map_err(to_relay_error)?;
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> RelayResult<Vec<String>> {
        let mut conn = self.manager.clone();
        let pattern = format!("{prefix}*");
        let keys: Vec<String> = conn.keys(pattern).await.map_err(to_relay_error)?;
        Ok(keys)
    }

    async fn health_check(&self) -> RelayResult<()> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(to_relay_error)?;
        Ok(())
    }
}
