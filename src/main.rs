//! GB Electricity Market Proxy
//!
//! Caching reverse proxy in front of the Elexon BMRS API: shields the
//! upstream from repeated dashboard requests, derives clean metrics from
//! raw datasets, and serves a stable JSON contract.

use anyhow::{Context, Result};
use clap::Parser;
use gridproxy::{
    api::{self, AppState},
    cache::CacheStore,
    config::Config,
    elexon::ElexonClient,
    middleware::request_logging,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "gridproxy", about = "Caching proxy for the Elexon BMRS API")]
struct Args {
    /// Address to bind on.
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on; overrides PORT from the environment.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let port = args.port.unwrap_or(config.port);

    info!("⚡ GB Electricity Market Proxy starting");
    info!("Upstream: {}", config.elexon_base_url);

    let upstream = ElexonClient::new(config.elexon_base_url.clone(), config.fetch_timeout_secs);
    let state = AppState {
        cache: Arc::new(CacheStore::new()),
        upstream: Arc::new(upstream),
        config: Arc::new(config),
    };

    let app = api::router(state)
        .layer(axum::middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from((args.bind, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("🎯 Proxy listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Initialize tracing with env-filter controlled verbosity.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridproxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
