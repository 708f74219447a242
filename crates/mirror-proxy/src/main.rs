//! mirror-proxy: duplicates every inbound request to a list of destinations
//! and answers with the primary destination's response.

mod config;
mod error;
mod mirror;
mod server;
#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use config::ProxyConfig;
use mirror::events::TracingSink;
use server::AppState;

fn main() -> anyhow::Result<()> {
    // Determine config path
    let config_path = {
        let args: Vec<String> = std::env::args().collect();
        // Check for --config flag first
        args.iter()
            .position(|a| a == "--config")
            .and_then(|i| args.get(i + 1).cloned())
            // Fall back to positional arg
            .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
            .or_else(|| std::env::var("MIRROR_PROXY_CONFIG").ok())
            .unwrap_or_else(|| "mirror-proxy.toml".to_string())
    };

    // Load configuration; any failure here is fatal
    let config = ProxyConfig::load(&config_path)?;

    // The OTLP gRPC exporter needs a reactor, so build the runtime before tracing
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let _tracing_guard = mirror_tracing::init_tracing(&config.tracing_config());

        tracing::info!(
            config_path = %config_path,
            listen_address = %config.listen_address(),
            forward_urls = ?config.forward_urls,
            timeout_secs = config.timeout_secs,
            "Starting mirror-proxy"
        );
        if config.forward_urls.is_empty() {
            tracing::warn!("forward_urls is empty, every request will be answered with 502");
        }

        run(config).await
    })
}

async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    // One pooled client shared by all dispatches
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .build()?;

    let state = AppState::new(config, client, Arc::new(TracingSink));

    server::run(state).await
}
