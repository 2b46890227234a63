//! Process entry point: parses `RelayOptions`, bootstraps `RelayCore`, and
//! runs until a shutdown signal arrives (spec §1 Non-goals: the HTTP
//! handler layer that would actually expose `/auth`, `/feature-configs`,
//! `/target-segments`, `/stream`, `/metrics` against `RelayCore::proxy` is
//! out of scope here — this binary only owns the core's lifecycle).

use clap::Parser;
use relay_service::{RelayCore, RelayOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = RelayOptions::parse();
    init_tracing(options.debug);

    tracing::info!(
        offline = options.offline,
        flag_stream_enabled = options.flag_stream_enabled,
        cache = if options.cache_is_remote() { "redis" } else { "memory" },
        "starting relay-edge core"
    );

    let core = RelayCore::bootstrap(&options).await?;
    tracing::info!("relay-edge core ready; the (out-of-scope) HTTP layer would flip to serving mode here");

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received; stopping relay-edge core");
    core.shutdown().await;

    Ok(())
}

fn init_tracing(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt().with_env_filter(filter).json().init();
}

/// Waits for either `SIGINT` or (on unix) `SIGTERM`, whichever arrives
/// first. Mirrors the signal set the teacher's server binary shuts down on.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
