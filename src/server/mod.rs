//! # Server — HTTP Surface for Build History and Release Review
//!
//! Runs an Axum HTTP server exposing the two request flows plus health and
//! metrics endpoints. Every request passes through the same layer stack:
//! CORS, panic catching, request-id tagging with duration metrics, tracing,
//! a 1 MiB body limit and a 30 s timeout.

pub mod middleware_auth;
mod routes_builds;
mod routes_health;
mod routes_releases;

use anyhow::{Context, Result};
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Instrument};

use crate::config::AppConfig;
use crate::context::{Actor, RequestContext};
use crate::db::Database;
use crate::github::{GitHubApi, GitHubClient};
use crate::prom_metrics;
use crate::release::notify::{AnnounceSettings, Notifier};
use crate::resource::ResourceStore;

pub struct AppState {
    pub db: Database,
    pub resources: ResourceStore,
    pub github: Arc<dyn GitHubApi>,
    pub notifier: Notifier,
    pub prom_metrics: prom_metrics::Metrics,
    pub jwt_secret: String,
}

impl AppState {
    /// Assemble the shared state and start the announcement worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        db: Database,
        resources: ResourceStore,
        github: Arc<dyn GitHubApi>,
        announce: AnnounceSettings,
        jwt_secret: &str,
    ) -> Arc<Self> {
        let prom_metrics = prom_metrics::Metrics::new();
        let notifier = Notifier::spawn(
            Arc::clone(&github),
            announce,
            prom_metrics.announcements.clone(),
        );
        Arc::new(AppState {
            db,
            resources,
            github,
            notifier,
            prom_metrics,
            jwt_secret: jwt_secret.to_string(),
        })
    }

    pub fn context<'a>(&'a self, actor: &'a Actor) -> RequestContext<'a> {
        RequestContext {
            actor,
            db: &self.db,
            resources: &self.resources,
            github: self.github.as_ref(),
            notifier: &self.notifier,
            metrics: &self.prom_metrics,
        }
    }
}

/// Middleware that records HTTP request duration into the Prometheus histogram,
/// generates (or propagates) a request ID for correlation, and wraps the
/// request in a tracing span using `.instrument()` for proper async propagation.
async fn metrics_middleware(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> axum::response::Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = req.method().to_string();
    let raw_path = req.uri().path().to_string();
    let norm_path = normalize_path(&raw_path);
    let start = std::time::Instant::now();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %raw_path,
    );
    let mut response = next.run(req).instrument(span).await;

    let duration = start.elapsed().as_secs_f64();
    state
        .prom_metrics
        .http_request_duration
        .get_or_create(&prom_metrics::HttpLabel {
            method,
            path: norm_path,
        })
        .observe(duration);

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Collapse numeric segments into `:id` so histogram labels stay bounded.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()) {
                ":id"
            } else {
                seg
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(routes_health::handler_healthz))
        .route("/readyz", get(routes_health::handler_readyz))
        .route("/metrics", get(routes_health::handler_metrics))
        .route(
            "/api/builds/history",
            get(routes_builds::handler_build_history),
        )
        .route(
            "/api/releases/state",
            post(routes_releases::handler_release_state),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CatchPanicLayer::new())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .with_state(state)
}

pub async fn run(config: &AppConfig) -> Result<()> {
    config.validate()?;
    let database_url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL is required")?;
    let jwt_secret = config
        .auth
        .jwt_secret
        .as_deref()
        .context("JWT_SECRET is required")?;

    let database = Database::connect(database_url).await?;
    let github: Arc<dyn GitHubApi> = Arc::new(GitHubClient::new(&config.github.api_base)?);
    let resources = ResourceStore::new(config.resources.root.clone());
    if config.github.bot_token.is_none() {
        tracing::warn!("GITHUB_BOT_TOKEN not set, release announcements will be skipped");
    }

    let state = AppState::new(
        database,
        resources,
        github,
        config.announce_settings(),
        jwt_secret,
    );
    let app = build_router(state);

    let port = config.server.port;
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, resource_root = %config.resources.root.display(), "server running");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! { _ = ctrl_c => info!("received SIGINT, shutting down"), _ = sigterm.recv() => info!("received SIGTERM, shutting down") }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
                info!("received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT, shutting down");
    }
}
