use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use ballotbox_core::store::SqliteStore;
use ballotbox_core::{poll, AppConfig, AppState, QuestionSuggester, Storage};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

use config::{Config, StorageBackend};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ballotbox=info,tower_http=debug")),
        )
        .init();

    let args = cli::Args::parse();
    let mut config = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
        config.validate()?;
    }

    let store = open_store(&config).await?;
    tracing::info!(backend = store.backend_name(), "poll store ready");

    if config.server.seed_demo || args.seed_demo {
        if poll::seed_demo_poll(&store).await? {
            tracing::info!(poll_id = poll::DEMO_POLL_ID, "seeded demo poll");
        }
    }

    let suggester = QuestionSuggester::from_config(&config.suggestions)
        .context("failed to build question suggester")?;
    let app_config = config.app_config();
    let cors = cors_layer(&app_config);
    let state = AppState::new(store.clone(), suggester, app_config);

    let app = ballotbox_api::build_router()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_address))?;

    print_startup_banner(&config, store.backend_name());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Storage::Sqlite(sqlite) = &store {
        sqlite.pool().close().await;
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn open_store(config: &Config) -> Result<Storage> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Storage::memory()),
        StorageBackend::Sqlite => {
            ensure_db_dir(&config.storage.database_url);
            let store =
                SqliteStore::connect(&config.storage.database_url, config.storage.max_connections)
                    .await
                    .with_context(|| {
                        format!("failed to open database {}", config.storage.database_url)
                    })?;
            Ok(Storage::Sqlite(store))
        }
    }
}

/// Create the parent directory of a `sqlite://` file URL.
fn ensure_db_dir(database_url: &str) {
    let Some(db_path) = database_url
        .strip_prefix("sqlite://")
        .and_then(|s| s.split('?').next())
    else {
        return;
    };
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Could not create directory '{}': {}", parent.display(), e);
            }
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match config
        .public_url
        .as_deref()
        .map(|url| url.trim_end_matches('/'))
        .and_then(|url| HeaderValue::from_str(url).ok())
    {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
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

    println!();
    tracing::info!("Shutting down...");
}

fn print_startup_banner(config: &Config, backend: &str) {
    let suggestions = if config.suggestions.enabled {
        config.suggestions.model.as_str()
    } else {
        "disabled"
    };

    println!();
    println!("  Ballotbox {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  Listening:   http://{}", config.server.bind_address);
    if let Some(url) = config.app_config().public_url {
        println!("  Public URL:  {}", url);
    }
    println!("  Storage:     {}", backend);
    println!("  Votes:       {:?}", config.voting.duplicate_policy);
    println!("  Suggestions: {}", suggestions);
    println!();
}
