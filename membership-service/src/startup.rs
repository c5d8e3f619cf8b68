//! Application startup and lifecycle management.

use crate::config::MembershipConfig;
use crate::handlers;
use crate::models::UserProfile;
use crate::services::{get_metrics, Database};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde_json::json;
use service_core::cache::TtlCache;
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: MembershipConfig,
    pub db: Database,
    pub profiles: Arc<TtlCache<Uuid, UserProfile>>,
}

impl AppState {
    /// User profile lookup through the TTL cache.
    ///
    /// Writers that change a user's tier must call
    /// `self.profiles.invalidate(&user_id)` after committing.
    pub async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        if let Some(profile) = self.profiles.get(&user_id) {
            return Ok(Some(profile));
        }

        let user = self.db.get_user(user_id).await?;
        Ok(user.map(|u| {
            let profile = UserProfile::from(&u);
            self.profiles.insert(user_id, profile.clone());
            profile
        }))
    }
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "membership-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "membership-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = get_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: MembershipConfig) -> Result<Self, AppError> {
        crate::services::init_metrics();

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let profiles = Arc::new(TtlCache::new(
            config.profile_cache.capacity,
            Duration::from_secs(config.profile_cache.ttl_seconds),
        ));

        let state = AppState {
            config: config.clone(),
            db,
            profiles,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Membership service listener bound");

        Ok(Self {
            http_port,
            listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_handler))
            // Gateway callbacks
            .route(
                "/api/webhooks/mobile-money",
                post(handlers::webhook::mobile_money),
            )
            // Subscriptions
            .route(
                "/api/subscriptions/checkout",
                post(handlers::subscription::checkout),
            )
            .route(
                "/api/subscriptions/activate",
                post(handlers::subscription::activate),
            )
            .route(
                "/api/subscriptions/:id",
                get(handlers::subscription::get_subscription),
            )
            .route(
                "/api/users/:user_id/subscriptions",
                get(handlers::subscription::list_user_subscriptions),
            )
            // Secours token ledger
            .route("/api/secours/purchase", post(handlers::secours::purchase))
            .route(
                "/api/secours/balance/:user_id",
                get(handlers::secours::balance),
            )
            .route(
                "/api/secours/transactions/:user_id",
                get(handlers::secours::history),
            )
            .route("/api/secours/withdraw", post(handlers::secours::withdraw))
            // Affiliate reporting
            .route(
                "/api/affiliate/summary/:user_id",
                get(handlers::affiliate::summary),
            )
            .route(
                "/api/affiliate/leaderboard",
                get(handlers::affiliate::leaderboard),
            )
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(self.state);

        tracing::info!(
            service = "membership-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
