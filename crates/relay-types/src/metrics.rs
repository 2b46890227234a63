use serde::{Deserialize, Serialize};

use crate::ids::EnvironmentId;

/// One SDK-reported evaluation count for a single flag/variation pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsDataPoint {
    pub feature: String,
    pub variation: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDataPoint {
    pub identifier: String,
    pub name: Option<String>,
}

/// The body of `POST /metrics`: per-environment SDK metrics, accumulated in
/// `MetricService` and flushed & cleared periodically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsRequest {
    pub environment: Option<EnvironmentId>,
    #[serde(default)]
    pub metrics_data: Vec<MetricsDataPoint>,
    #[serde(default)]
    pub target_data: Vec<TargetDataPoint>,
    #[serde(default)]
    pub attributes: std::collections::HashMap<String, String>,
}

pub const ATTR_SDK_TYPE: &str = "SDK_TYPE";
pub const ATTR_SDK_VERSION: &str = "SDK_VERSION";
pub const ATTR_JAR_VERSION: &str = "JAR_VERSION";
pub const ATTR_SDK_LANGUAGE: &str = "SDK_LANGUAGE";

impl MetricsRequest {
    /// Derives the `{sdkType, sdkVersion, sdkLanguage}` label set used for the
    /// `sdk_usage` counter, falling back from `SDK_VERSION` to the legacy
    /// `JAR_VERSION` attribute (spec §4.8).
    pub fn sdk_usage_labels(&self) -> SdkUsageLabels {
        SdkUsageLabels {
            sdk_type: self.attributes.get(ATTR_SDK_TYPE).cloned(),
            sdk_version: self
                .attributes
                .get(ATTR_SDK_VERSION)
                .or_else(|| self.attributes.get(ATTR_JAR_VERSION))
                .cloned(),
            sdk_language: self.attributes.get(ATTR_SDK_LANGUAGE).cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SdkUsageLabels {
    pub sdk_type: Option<String>,
    pub sdk_version: Option<String>,
    pub sdk_language: Option<String>,
}
