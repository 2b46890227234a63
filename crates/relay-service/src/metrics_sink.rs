//! The `MetricsSink` implementation for online mode: `POST
//! /metrics/<envID>?cluster=<id>` against the same SaaS backend
//! `RemoteConfigLoader` authenticates against (spec §6, §4.8).

use std::sync::Arc;

use async_trait::async_trait;
use relay_config_remote::RemoteConfigLoader;
use relay_metrics::MetricsSink;
use relay_types::{EnvironmentId, MetricsRequest, RelayError, RelayResult};
use reqwest::Client;

pub struct SaasMetricsSink {
    client: Client,
    loader: Arc<RemoteConfigLoader>,
}

impl SaasMetricsSink {
    pub fn new(client: Client, loader: Arc<RemoteConfigLoader>) -> Self {
        Self { client, loader }
    }
}

#[async_trait]
impl MetricsSink for SaasMetricsSink {
    async fn send(&self, environment: &EnvironmentId, cluster_identifier: &str, batch: &MetricsRequest) -> RelayResult<()> {
        let token = self.loader.token()?;
        let url = format!("{}/metrics/{environment}", self.loader.base_url());

        let response = self
            .client
            .post(&url)
            .query(&[("cluster", cluster_identifier)])
            .bearer_auth(token)
            .json(batch)
            .send()
            .await
            .map_err(|e| RelayError::transient(format!("metrics flush request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(RelayError::internal(format!("metrics flush rejected: {}", response.status())));
        }
        Ok(())
    }
}

/// Discards every batch. Used in offline mode, where there is no upstream
/// to forward metrics to but `MetricService` still needs a sink to exist.
pub struct DiscardingMetricsSink;

#[async_trait]
impl MetricsSink for DiscardingMetricsSink {
    async fn send(&self, _environment: &EnvironmentId, _cluster_identifier: &str, _batch: &MetricsRequest) -> RelayResult<()> {
        Ok(())
    }
}
