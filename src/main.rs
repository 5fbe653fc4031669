use tracing::{info, warn};

use vision_relay::{
    api::{build_router, AppState},
    config::Config,
    observability::init_tracing,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    init_tracing(&config.logging);

    if config.gateway.api_key.is_none() {
        warn!("No API key configured; set DASHSCOPE_API_KEY");
    }

    let state = AppState::from_config(&config)?;
    let router = build_router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(
        "Listening on {} (model={}, upstream={})",
        config.bind_addr(),
        config.gateway.model,
        config.gateway.base_url
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
