use anyhow::Context;
use clap::Parser;
use news_aggregator::config::{Config, LogFormat};
use news_aggregator::server::{start_server, ServerState, SharedState};
use news_aggregator::{Fetcher, NewsAggregator, NewsCache};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_format)?;

    info!("Starting News Aggregator");
    config.validate()?;
    info!("Cache TTL: {} seconds, max limit {}", config.cache_ttl_seconds, config.max_limit);
    info!("Refresh scope: {:?}", config.refresh_scope);

    let fetcher = Fetcher::new(config.fetch_config()).context("failed to build HTTP client")?;
    let registry = Arc::new(config.build_registry(&fetcher));
    info!("Registered sources: {}", registry.ids().join(", "));

    let aggregator = NewsAggregator::new(registry);
    let cache = NewsCache::new(aggregator, config.cache_config());
    let state: SharedState = Arc::new(ServerState::new(
        cache.clone(),
        config.default_limit,
        config.default_source.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    start_server(state, addr, shutdown_signal()).await?;

    info!("Waiting for background refreshes");
    cache.drain_background().await;
    info!("News Aggregator stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::from_default_env().add_directive("news_aggregator=info".parse()?);

    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(env_filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
