use std::sync::Arc;

use anyhow::Context;

use pvz_infra::AppConfig;
use pvz_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("invalid configuration")?;

    let log_format = config.log_format.parse().unwrap_or_else(|e| {
        eprintln!("{e}; falling back to json logs");
        LogFormat::Json
    });
    pvz_observability::init(log_format);

    let services = pvz_api::app::services::build_services(&config)
        .await
        .context("failed to initialise storage")?;
    let jwt = pvz_api::app::jwt_from_config(&config.jwt)?;
    let app = pvz_api::app::build_app(Arc::new(services), jwt);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, environment = %config.environment, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
