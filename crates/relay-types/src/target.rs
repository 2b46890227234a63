use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::EnvironmentId;

/// A user/entity to evaluate a flag against. Read-only from the proxy's
/// perspective: fetched from admin, never mutated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    pub environment: EnvironmentId,
}
