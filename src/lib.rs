pub mod api;
pub mod audit;
pub mod clock;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod protocol;

#[cfg(test)]
mod log_audit;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Start the training server and block until Ctrl-C.
pub async fn run() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let app_config = config::AppConfig::from_env().map_err(|e| e.to_string())?;
    if app_config.instructor_pin.is_none() {
        tracing::warn!("No instructor PIN configured; clock and deletion routes are disabled");
    }

    let core = Arc::new(core_state::CoreState::open(&app_config).map_err(|e| e.to_string())?);
    let mut server = api::start_api_server(core.clone(), app_config.bind_addr).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for shutdown signal: {e}"))?;

    server.shutdown();
    if let Err(e) = core.flush_and_prune_audit() {
        tracing::error!("Final audit flush failed: {e}");
    }
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
