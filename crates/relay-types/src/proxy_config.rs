use serde::{Deserialize, Serialize};

use crate::{flags::FeatureFlag, ids::EnvironmentId, segments::Segment};

/// Input to the ingestion pipeline: the upstream payload enumerating, per
/// environment, API keys + flags + segments (spec §3, entity `ProxyConfig`,
/// and §6 `GET /proxy/config` response body).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub environments: Vec<ProxyEnvironment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyEnvironment {
    pub id: EnvironmentId,
    #[serde(default, rename = "apiKeys")]
    pub api_keys: Vec<String>,
    #[serde(default, rename = "featureConfigs")]
    pub feature_configs: Vec<FeatureFlag>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// Both loaders (local and remote) produce one of these per environment and
/// hand it to the populator, which fans it out across the repositories. The
/// shape is identical to a single `ProxyEnvironment`: raw API keys plus the
/// flags/segments for one environment.
pub type ConfigObject = ProxyEnvironment;

/// A single page of `GET /proxy/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfigPage {
    pub environments: Vec<ProxyEnvironment>,
    pub page_index: u32,
    pub page_count: u32,
    pub item_count: u32,
}

impl ProxyConfigPage {
    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyAuthRequest {
    pub proxy_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyAuthResponse {
    pub auth_token: String,
    pub cluster_identifier: String,
}
