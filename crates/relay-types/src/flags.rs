use serde::{Deserialize, Serialize};

use crate::ids::EnvironmentId;

/// A feature toggle configuration. The proxy does not evaluate flags, only
/// serves them verbatim to the SDK, so every field here is opaque data that
/// passes through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub identifier: String,
    pub kind: FlagKind,
    pub default_serve: Variation,
    pub off_variation: String,
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub rules: Vec<FlagRule>,
    /// Flat map of variation identifier to target identifiers served that
    /// variation regardless of rule evaluation.
    #[serde(default)]
    pub variation_to_target_map: Vec<VariationTargetMap>,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    pub state: FlagState,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    Boolean,
    String,
    Number,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagState {
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub identifier: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRule {
    pub rule_id: String,
    pub serve: RuleServe,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleServe {
    pub variation: Option<String>,
    #[serde(default)]
    pub distribution: Vec<WeightedVariation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedVariation {
    pub variation: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub attribute: String,
    pub op: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationTargetMap {
    pub variation: String,
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub feature: String,
    pub variation: String,
}

/// `EnvironmentID` plus the ordered list of `FeatureFlag` records held for
/// that environment (spec §3, entity `FlagConfig`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagConfig {
    pub environment: EnvironmentId,
    pub flags: Vec<FeatureFlag>,
}

impl FlagConfig {
    pub fn new(environment: EnvironmentId, flags: Vec<FeatureFlag>) -> Self {
        Self { environment, flags }
    }
}
