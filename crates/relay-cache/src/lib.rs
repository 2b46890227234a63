//! The pluggable key/value cache described in spec §4.1. A mapping from
//! namespaced string key to opaque byte value, with two backends
//! implementing the same [`Cache`] contract: [`memory::MemoryCache`]
//! (process-local, mutex-guarded map) and [`remote::RedisCache`] (shared,
//! pipelined, transparently-reconnecting). Backend selection happens once at
//! startup in `relay-service`; nothing downstream of [`Cache`] knows which
//! one it's talking to.

pub mod memory;
pub mod remote;

use async_trait::async_trait;
use relay_types::RelayResult;

/// "Not found" is a typed condition, not an error (spec §4.1 error model):
/// callers distinguish "the key legitimately doesn't exist" from "the cache
/// backend failed" by matching on `Ok(None)` vs `Err(_)`.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> RelayResult<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>) -> RelayResult<()>;
    async fn delete(&self, key: &str) -> RelayResult<()>;

    /// Keys matching `prefix`, bounded by the prefix; order is unspecified.
    async fn scan(&self, prefix: &str) -> RelayResult<Vec<String>>;

    async fn health_check(&self) -> RelayResult<()>;
}

pub use memory::MemoryCache;
pub use remote::RedisCache;
