//! Process-wide configuration, built once via `clap` derive (spec §6) and
//! carried by value through every constructor downstream — never a
//! global/`lazy_static` (spec §9, Design Note 3).

use std::path::PathBuf;

use clap::Parser;

/// Every component in `relay-service` is constructed from one of these,
/// built once at startup. CLI parsing and process bootstrap *behavior*
/// remain out of scope (spec §1 Non-goals); this struct is the thing that
/// behavior would hand to the core.
#[derive(Parser, Debug, Clone)]
#[command(name = "relay-edge", about = "Feature-flag relay/edge proxy core")]
pub struct RelayOptions {
    /// Select `LocalConfigLoader` instead of `RemoteConfigLoader`.
    #[arg(long, env = "OFFLINE", default_value_t = false)]
    pub offline: bool,

    /// Offline config root, read when `offline` is set.
    #[arg(long, env = "CONFIG_DIR", default_value = "/etc/relay/config")]
    pub config_dir: PathBuf,

    /// SaaS control-plane base URL, used when `offline` is unset.
    #[arg(long, env = "CONTROL_PLANE_URL", default_value = "https://app.example.com/api/v1")]
    pub control_plane_url: String,

    /// SaaS authentication credential.
    #[arg(long, env = "PROXY_KEY", default_value = "")]
    pub proxy_key: String,

    /// HS256 signing secret for issued SDK bearer tokens.
    #[arg(long, env = "AUTH_SECRET", default_value = "")]
    pub auth_secret: String,

    /// Disables token validation entirely. Test deployments only.
    #[arg(long, env = "BYPASS_AUTH", default_value_t = false)]
    pub bypass_auth: bool,

    /// Bind address of the (out-of-scope) HTTP layer.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "DEBUG", default_value_t = false)]
    pub debug: bool,

    /// Remote cache backend address; empty selects the in-memory backend.
    #[arg(long, env = "REDIS_ADDR", default_value = "")]
    pub redis_addr: String,

    /// Interval between metrics flushes, in seconds. 0 disables forwarding.
    #[arg(long, env = "METRIC_POST_DURATION", default_value_t = 60)]
    pub metric_post_duration: u64,

    /// `false` forces the polling fallback instead of SSE streaming.
    #[arg(long, env = "FLAG_STREAM_ENABLED", default_value_t = true)]
    pub flag_stream_enabled: bool,

    /// Wall-clock re-poll interval when streaming is disabled (spec §4.4).
    #[arg(long, env = "POLL_INTERVAL_MINUTES", default_value_t = 60)]
    pub poll_interval_minutes: u64,

    /// Bounded concurrency for per-environment population (spec §5).
    #[arg(long, env = "FETCH_CONCURRENCY", default_value_t = 10)]
    pub fetch_concurrency: usize,
}

impl RelayOptions {
    pub fn metrics_enabled(&self) -> bool {
        self.metric_post_duration > 0
    }

    pub fn cache_is_remote(&self) -> bool {
        !self.redis_addr.is_empty()
    }
}
