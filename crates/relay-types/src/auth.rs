use serde::{Deserialize, Serialize};

use crate::ids::EnvironmentId;

/// `APIKey` (hashed) to `EnvironmentID` mapping. Created from RemoteConfig or
/// LocalConfig, replaced wholesale on reload, removed when the environment or
/// key is revoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub hashed_api_key: String,
    pub environment: EnvironmentId,
}

/// Signed bearer issued by `TokenSource`, consumed by the auth middleware.
/// Claims intentionally omit `exp`: tokens are long-lived, bound to the
/// signing secret and the cache snapshot rather than a wall-clock deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub environment: String,
    pub iat: i64,
    pub nbf: i64,
}
