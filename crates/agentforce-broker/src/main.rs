//! Agentforce credential broker.
//!
//! Run with: cargo run -p agentforce-broker
//!
//! Requires `SALESFORCE_INSTANCE_URL`, `SALESFORCE_CLIENT_ID`,
//! `SALESFORCE_CLIENT_SECRET` and `SALESFORCE_AGENT_ID`.

use std::net::SocketAddr;

use agentforce_broker::{AppState, BrokerSettings, router};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = BrokerSettings::parse();

    let default_filter = if settings.debug() { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(
        environment = %settings.environment,
        instance_url = %settings.instance_url,
        "Agentforce broker starting"
    );

    let app = router(AppState::new(settings));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Health check: http://{addr}/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
