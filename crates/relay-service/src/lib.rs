//! Process-wide options, the `ProxyService` contract the (out-of-scope)
//! HTTP layer is built against, and the wiring that turns one `RelayOptions`
//! into a running core (spec §2, §6, §9).

mod bootstrap;
mod contract;
mod metrics_sink;
mod options;
mod service;

pub use bootstrap::RelayCore;
pub use contract::{AuthedRequest, Evaluation, ProxyService};
pub use metrics_sink::{DiscardingMetricsSink, SaasMetricsSink};
pub use options::RelayOptions;
pub use service::{is_ready, ProxyServiceImpl};
