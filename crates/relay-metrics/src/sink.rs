use async_trait::async_trait;
use relay_types::{EnvironmentId, MetricsRequest, RelayResult};

/// The narrow upstream interface `MetricService` flushes through: `POST
/// /metrics/<envID>?cluster=<id>` with a bearer token (spec §6). The SaaS
/// REST client itself is out of scope (spec §1); `relay-service` supplies
/// the real implementation, wrapping the same bearer token
/// `RemoteConfigLoader` already holds.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn send(&self, environment: &EnvironmentId, cluster_identifier: &str, batch: &MetricsRequest) -> RelayResult<()>;
}
