//! addrsync-daemon entry point.
//!
//! Sets up tracing, picks the storage backend, builds the shared state,
//! wires middleware and starts the HTTP server. Handlers live in `routes.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use addrsync_config::{AddressSyncConfig, UnusedKeyPolicy};
use addrsync_daemon::{
    routes,
    state::{seed_orders_from_json, AppState},
};
use addrsync_db::{PgOrderStore, PgPolicyStore};
use addrsync_runtime::MemoryOrderStore;
use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

/// Comma-separated list of layered YAML config files.
const ENV_CONFIG: &str = "ADDRSYNC_CONFIG";
const ENV_DAEMON_ADDR: &str = "ADDRSYNC_DAEMON_ADDR";
const ENV_API_TOKEN: &str = "ADDRSYNC_API_TOKEN";
/// JSON file of orders loaded into the in-memory store at boot.
const ENV_SEED_ORDERS: &str = "ADDRSYNC_SEED_ORDERS";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let settings = load_settings()?;

    let state = if std::env::var(addrsync_db::ENV_DB_URL).is_ok() {
        let pool = addrsync_db::connect_from_env().await?;
        addrsync_db::migrate(&pool).await?;
        info!("storage: postgres");
        AppState::new(
            Arc::new(PgOrderStore::new(pool.clone())),
            Arc::new(PgPolicyStore::new(pool)),
        )
    } else {
        warn!(
            "{} not set; using in-memory storage (orders are lost on exit)",
            addrsync_db::ENV_DB_URL
        );
        AppState::in_memory(settings.policy.clone(), load_seed_orders()?)
    };

    let state = state
        .with_page_size(settings.bulk.page_size)
        .with_api_token(std::env::var(ENV_API_TOKEN).ok());
    if state.api_token.is_none() {
        warn!("{ENV_API_TOKEN} not set; API is unauthenticated");
    }

    let shared = Arc::new(state);
    addrsync_daemon::state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("addrsync-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_settings() -> anyhow::Result<AddressSyncConfig> {
    let Ok(raw) = std::env::var(ENV_CONFIG) else {
        return Ok(AddressSyncConfig::default());
    };
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let loaded = addrsync_config::load_layered_yaml(&paths)?;
    let report = addrsync_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &report.unused_leaf_pointers {
        warn!(key = %key, "unused config key");
    }
    info!(config_hash = %loaded.config_hash, "config loaded");
    Ok(loaded.settings)
}

fn load_seed_orders() -> anyhow::Result<MemoryOrderStore> {
    let Ok(path) = std::env::var(ENV_SEED_ORDERS) else {
        warn!("{ENV_SEED_ORDERS} not set; in-memory store starts empty");
        return Ok(MemoryOrderStore::new());
    };
    let raw = std::fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
    let store = seed_orders_from_json(&raw).with_context(|| format!("seed orders from {path}"))?;
    info!(path = %path, "seeded in-memory orders");
    Ok(store)
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_DAEMON_ADDR).ok()?.parse().ok()
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:8080",
        "http://127.0.0.1:8080",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
