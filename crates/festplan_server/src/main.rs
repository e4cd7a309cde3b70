//! Festplan server entry point.
//!
//! # Responsibility
//! - Resolve configuration, bootstrap logging and storage, serve HTTP until
//!   a shutdown signal arrives.

use festplan_server::config::ServerConfig;
use festplan_server::{ai::AiClient, build_router, AppState};
use festplan_core::{PlanService, SqlitePartitionStore};
use log::info;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), String> {
    let config = ServerConfig::from_env();

    festplan_core::init_logging(&config.log_level, config.log_dir.as_deref())?;

    let conn = festplan_core::db::open_db(&config.db_path).map_err(|err| {
        format!(
            "failed to open database `{}`: {err}",
            config.db_path.display()
        )
    })?;
    let service = Arc::new(PlanService::new(SqlitePartitionStore::new(conn)));

    let ai = match config.ai.clone() {
        Some(ai_config) => Some(Arc::new(AiClient::new(ai_config)?)),
        None => None,
    };

    let state = AppState {
        service,
        ai: ai.clone(),
        static_dir: config.static_dir.clone(),
    };

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|err| format!("failed to bind `{}`: {err}", config.bind_addr))?;

    info!(
        "event=server_start module=server status=ok bind={} db={} ai={} version={}",
        config.bind_addr,
        config.db_path.display(),
        if ai.is_some() { "enabled" } else { "disabled" },
        festplan_core::core_version()
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(|err| format!("server error: {err}"))?;

    info!("event=server_stop module=server status=ok");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
