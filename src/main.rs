use std::sync::Arc;

use anyhow::Context;
use study_planner::api;
use study_planner::config::{DEFAULT_DB_PATH, ServerConfig};
use study_planner::planner::StateGateway;
use study_planner::store::{LibSqlBackend, StateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env().context("invalid server configuration")?;

    if !config.db_path_from_env {
        tracing::warn!(
            path = DEFAULT_DB_PATH,
            "STUDY_PLANNER_DB_PATH not set, using default database path"
        );
    }

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn StateStore> = if config.is_in_memory() {
        tracing::warn!("Using in-memory database, state is lost on exit");
        Arc::new(LibSqlBackend::new_memory().await?)
    } else {
        Arc::new(
            LibSqlBackend::new_local(&config.db_path)
                .await
                .with_context(|| {
                    format!("failed to open database at {}", config.db_path.display())
                })?,
        )
    };

    let gateway = Arc::new(StateGateway::new(store).with_plan_policy(config.plan_policy));
    let app = api::app(gateway, &config.allowed_origins);

    // ── Server ───────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        port = config.port,
        origins = ?config.allowed_origins,
        plan_policy = ?config.plan_policy,
        "Study planner API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
