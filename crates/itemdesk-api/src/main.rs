//! itemdesk API Server
//!
//! Loads configuration, connects to PostgreSQL and serves the REST API until
//! Ctrl-C or SIGTERM.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use itemdesk_api::{create_router, state::AppState};
use itemdesk_core::config::{AppConfig, LoggingConfig};
use itemdesk_core::PgStore;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable naming an optional TOML config file
const CONFIG_PATH_ENV: &str = "ITEMDESK_CONFIG";

fn init_tracing(config: &LoggingConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=debug", config.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => AppConfig::from_file(&path)
            .with_context(|| format!("loading {CONFIG_PATH_ENV}={path}"))?
            .with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    if config.auth.uses_development_secret() {
        warn!("Using the built-in development secret; set SECRET_KEY in production");
    }

    // Connect to the database
    let store = PgStore::connect(&config.database)
        .await
        .context("connecting to PostgreSQL")?;
    if config.database.run_migrations {
        store.migrate().await.context("creating database schema")?;
    }

    let addr = config.server.bind_address();
    let store = Arc::new(store);
    let state = Arc::new(AppState::new(config, store.clone(), store.clone())?);

    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("itemdesk API server starting on http://{}", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    info!("Server stopped");

    Ok(())
}
