use std::sync::Arc;

use anyhow::Context;

use atlaserp_api::app::services::{self, ApiSettings};
use atlaserp_api::context::AppContext;
use atlaserp_orchestrator::OrchestratorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    atlaserp_observability::init();

    let settings = ApiSettings::from_env();
    let config = OrchestratorConfig::from_env().context("invalid orchestrator configuration")?;

    let orchestrator = Arc::new(services::build_orchestrator(&settings, config)?);
    orchestrator
        .initialize()
        .await
        .context("failed to initialize orchestrator")?;

    let app = atlaserp_api::app::build_app(AppContext::new(orchestrator.clone()));

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.cleanup().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
