use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use callabo::api::{self, AppState};
use callabo::clock::SystemClock;
use callabo::config::Config;
use callabo::notify::LogDispatcher;
use callabo::tenant::TenantManager;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    callabo::observability::init(config.metrics_port);

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let tenants = Arc::new(TenantManager::new(config.data_dir.clone(), config.compact_threshold));
    let state = AppState {
        tenants,
        notifier: Arc::new(LogDispatcher),
        clock: Arc::new(SystemClock),
        policy: config.policy,
    };

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("callabo listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!(
        "  rates: friend {} / guest {} per night, personal stays up to {} nights",
        config.policy.pricing.rate_friend,
        config.policy.pricing.rate_guest,
        config.policy.pricing.max_personal_nights
    );
    info!(
        "  quota: {} nights per quarter ({})",
        config.policy.quota_nights_per_period,
        if config.policy.enforce_quota_counter { "enforced" } else { "not enforced" }
    );
    info!("  auto_confirm: {}", config.policy.auto_confirm);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("callabo stopped");
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining in-flight requests");
}
