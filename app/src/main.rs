//! Yume headless client
//!
//! Loads the configuration, starts the market readers and serves the local
//! API until interrupted.

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use yume_api::{start_server, AppState};
use yume_core::AppConfig;

fn env_filter() -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive("yume=debug".parse()?)
        .add_directive("info".parse()?))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(env_filter()?).init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Yume client");

    let config = AppConfig::from_env().context("loading configuration")?;
    for market in config.markets.iter().filter(|m| !m.is_deployed()) {
        tracing::warn!(market = %market.id, "Market has no deployed objects, reads disabled");
    }

    let port = config.api_port;
    let state = AppState::connect(config).context("creating RPC client")?;
    state.start_pollers().await;

    let served = start_server(state.clone(), port, shutdown_signal()).await;
    state.stop_pollers().await;
    served.with_context(|| format!("serving API on port {}", port))?;

    tracing::info!("Yume client stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(env_filter().is_ok());
    }
}
