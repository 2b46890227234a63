//! Shared entities and error kinds for the feature-flag relay core. Every
//! other crate in the workspace depends on this one; it depends on nothing
//! but `serde`.

pub mod auth;
pub mod error;
pub mod flags;
pub mod ids;
pub mod inventory;
pub mod metrics;
pub mod proxy_config;
pub mod segments;
pub mod stream;
pub mod target;

pub use auth::{AuthConfig, TokenClaims};
pub use error::{RelayError, RelayResult};
pub use flags::{FeatureFlag, FlagConfig, FlagKind, FlagState, Variation};
pub use ids::{AssetId, AssetKind, EnvironmentId};
pub use inventory::InventoryRecord;
pub use metrics::{MetricsRequest, SdkUsageLabels};
pub use proxy_config::{ConfigObject, ProxyAuthRequest, ProxyAuthResponse, ProxyConfig, ProxyConfigPage, ProxyEnvironment};
pub use segments::{Segment, SegmentConfig};
pub use stream::{Checkpoint, StreamEvent};
pub use target::Target;
