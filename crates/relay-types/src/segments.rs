use serde::{Deserialize, Serialize};

use crate::{flags::Clause, ids::EnvironmentId};

/// A named group of targets with inclusion/exclusion rules, referenced by
/// flag rules. The proxy serves these verbatim too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub identifier: String,
    #[serde(default)]
    pub included: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
    #[serde(default)]
    pub rules: Vec<Clause>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentConfig {
    pub environment: EnvironmentId,
    pub segments: Vec<Segment>,
}

impl SegmentConfig {
    pub fn new(environment: EnvironmentId, segments: Vec<Segment>) -> Self {
        Self {
            environment,
            segments,
        }
    }
}
