//! VitaDock OAuth gateway
//!
//! Single-binary service that:
//! 1. Sends the browser through the VitaDock three-legged authorization
//! 2. Keeps the resulting access credential in a server-side session
//! 3. Serves the user's recent thermometer readings, signed per request

mod config;
mod error;
mod metrics;
mod routes;
mod session;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitadock_api::VitaDockClient;
use vitadock_auth::{Consumer, ConsumerIdentity, build_store};

use crate::config::Config;
use crate::session::SessionStore;

/// In-flight requests get this long to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    consumer: Arc<Consumer>,
    api: VitaDockClient,
    sessions: SessionStore,
    temporary_credential_ttl_secs: u64,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// `max_connections` bounds concurrently processed requests.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/authorize", get(routes::authorize))
        .route("/callback", get(routes::callback))
        .route("/thermodocks", get(routes::thermodocks))
        .route("/thermodocks/generate", post(routes::generate))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON output, filter from LOG_LEVEL then RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting vitadock-gateway");

    let prometheus = metrics::install_recorder().context("failed to install metrics recorder")?;

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        provider = %config.provider.base_url,
        credential_store = ?config.server.credential_store,
        consumer_key = %config.consumer.key,
        "configuration loaded"
    );

    let state = build_state(config_state(&config)?, prometheus)?;
    let app = build_router(state, config.server.max_connections);

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;
    info!(addr = %config.server.listen_addr, "accepting requests");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    // The drain timer starts at signal receipt
    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Everything `build_state` needs, extracted from the loaded config.
struct StateParts {
    identity: ConsumerIdentity,
    provider: vitadock_auth::ProviderConfig,
    store_mode: vitadock_auth::CredentialStoreMode,
    store_key: Option<common::Secret<String>>,
    ttl: Duration,
    session_ttl: Duration,
    http: reqwest::Client,
}

fn config_state(config: &Config) -> Result<StateParts> {
    let secret = config
        .consumer
        .secret
        .clone()
        .context("consumer secret is not configured")?;
    let identity = ConsumerIdentity::new(config.consumer.key.clone(), secret)?;
    let http = reqwest::Client::builder()
        .timeout(config.server.timeout())
        .build()
        .context("failed to build HTTP client")?;
    Ok(StateParts {
        identity,
        provider: config.provider.clone(),
        store_mode: config.server.credential_store,
        store_key: config.consumer.store_key.clone(),
        ttl: config.server.temporary_credential_ttl(),
        session_ttl: config.server.session_ttl(),
        http,
    })
}

fn build_state(parts: StateParts, prometheus: PrometheusHandle) -> Result<AppState> {
    let store = build_store(parts.store_mode, parts.store_key, parts.ttl)?;
    let consumer = Consumer::new(
        parts.identity.clone(),
        parts.provider.clone(),
        parts.http.clone(),
        store,
    )?;
    let api = VitaDockClient::new(parts.identity, parts.provider, parts.http)?;
    Ok(AppState {
        consumer: Arc::new(consumer),
        api,
        sessions: SessionStore::new(parts.session_ttl),
        temporary_credential_ttl_secs: parts.ttl.as_secs(),
        started_at: Instant::now(),
        prometheus,
    })
}

/// Health endpoint: status, credential store backend, uptime, live sessions.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "credential_store": state.consumer.store().name(),
        "provider": state.consumer.provider().base_url,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "sessions": state.sessions.len().await,
    });
    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
