use std::fmt::{Display, Formatter};

/// A deployment scope (e.g. "dev", "prod") owning flags, segments, API keys.
/// Identified by a UUID string plus a human identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct EnvironmentId(pub String);

impl EnvironmentId {
    pub fn new(id: impl Into<String>) -> Self {
        EnvironmentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EnvironmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EnvironmentId {
    fn from(value: String) -> Self {
        EnvironmentId(value)
    }
}

impl From<&str> for EnvironmentId {
    fn from(value: &str) -> Self {
        EnvironmentId(value.to_string())
    }
}

/// An asset id is a composite `<envID>/<kind>/<identifier>` so the same
/// identifier in different environments doesn't collide (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct AssetId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    Flag,
    Segment,
}

impl Display for AssetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetKind::Flag => write!(f, "flag"),
            AssetKind::Segment => write!(f, "segment"),
        }
    }
}

impl AssetId {
    pub fn new(env: &EnvironmentId, kind: AssetKind, identifier: &str) -> Self {
        AssetId(format!("{env}/{kind}/{identifier}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
