//! The facade the HTTP layer calls (spec §2, §6): `Authenticate`,
//! `FeatureConfig`/`FeatureConfigByIdentifier`,
//! `TargetSegments`/`TargetSegmentsByIdentifier`, `Evaluations`, `Stream`,
//! `Metrics`. The HTTP handlers themselves, and the logging/auth
//! middlewares that wrap this trait, are out of scope (spec §1) — this
//! module only specifies the contract they're built against.

use async_trait::async_trait;
use relay_stream::BoxEventStream;
use relay_types::{EnvironmentId, FeatureFlag, MetricsRequest, RelayResult, Segment};
use serde::{Deserialize, Serialize};

/// Every entity-fetching method takes at minimum `{Token, EnvironmentID}`
/// (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthedRequest {
    pub token: String,
    pub environment: EnvironmentId,
}

impl AuthedRequest {
    pub fn new(token: impl Into<String>, environment: EnvironmentId) -> Self {
        Self {
            token: token.into(),
            environment,
        }
    }
}

/// A single flag's evaluated result for one target. Rule evaluation itself
/// is a Non-goal (spec §1: "flags are returned verbatim; the SDK evaluates
/// them") — this type exists so the contract's shape is complete, not
/// because `ProxyServiceImpl` computes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub flag: String,
    pub variation: String,
    pub value: serde_json::Value,
}

#[async_trait]
pub trait ProxyService: Send + Sync {
    /// Exchanges a raw SDK API key for a signed bearer token.
    async fn authenticate(&self, api_key: &str) -> RelayResult<String>;

    async fn feature_config(&self, req: &AuthedRequest) -> RelayResult<Vec<FeatureFlag>>;

    async fn feature_config_by_identifier(&self, req: &AuthedRequest, identifier: &str) -> RelayResult<FeatureFlag>;

    async fn target_segments(&self, req: &AuthedRequest) -> RelayResult<Vec<Segment>>;

    async fn target_segments_by_identifier(&self, req: &AuthedRequest, identifier: &str) -> RelayResult<Segment>;

    /// Out of scope by spec Non-goal (rule evaluation): the contract exists,
    /// the proxy does not compute it.
    async fn evaluations(&self, req: &AuthedRequest, target_identifier: &str) -> RelayResult<Vec<Evaluation>>;

    /// Subscribes the caller (typically an SSE-fanout component, spec §1) to
    /// this environment's topic, resuming from its persisted checkpoint.
    async fn stream(&self, req: &AuthedRequest) -> RelayResult<BoxEventStream>;

    async fn metrics(&self, req: MetricsRequest) -> RelayResult<()>;
}
