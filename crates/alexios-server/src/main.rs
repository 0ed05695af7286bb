//! Alexios skill server binary.
//!
//! Starts an axum HTTP server with structured logging, store initialization,
//! optional retention enforcement, and graceful shutdown on SIGTERM/SIGINT.

use alexios_db::DbRuntimeSettings;
use alexios_server::config::{self, Config, ConfigError, StoreBackend};
use alexios_server::dispatch::{Dispatcher, DispatcherSettings};
use alexios_server::{app, retention, AppState};
use alexios_store::{MemoryStore, MessageStore, SqliteStore, StoreError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Fatal startup and serving errors.
#[derive(Debug, Error)]
enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open store: {0}")]
    Store(#[from] StoreError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("ALEXIOS_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn MessageStore>, StoreError> {
    match config.database.backend {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store, messages are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let settings = DbRuntimeSettings {
                busy_timeout_ms: config.database.busy_timeout_ms,
                pool_max_size: config.database.pool_max_size,
            };
            let store = SqliteStore::open(&config.database.path, settings)?;
            tracing::info!(path = %config.database.path, "opened sqlite store");
            Ok(Arc::new(store))
        }
    }
}

async fn run() -> Result<(), ServerError> {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().unwrap_or("config.toml");

    let config = config::load_config(Some(selected_config_path))?;
    init_tracing(&config);

    tracing::info!(
        source = config_source,
        path = selected_config_path,
        "resolved startup configuration path"
    );

    let store = open_store(&config)?;

    if let Some(days) = config.retention.message_days {
        tokio::spawn(retention::start_retention_task(
            store.clone(),
            days,
            Duration::from_secs(config.retention.interval_seconds.max(1)),
        ));
    }

    let dispatcher = Dispatcher::new(
        store,
        DispatcherSettings {
            store_timeout: config.server.request_timeout(),
        },
        tracing::info_span!("dispatcher"),
    );
    let app = app(AppState { dispatcher });
    let addr = SocketAddr::new(config.server.host, config.server.port);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::info!(%addr, "running alexios server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("alexios server shut down");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // The subscriber may not be installed yet if configuration failed.
        eprintln!("alexios-server: {e}");
        tracing::error!(error = %e, "server terminated");
        std::process::exit(1);
    }
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
