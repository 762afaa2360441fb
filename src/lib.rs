pub mod config;
pub mod error;
pub mod forward;
pub mod gatekeeper;
pub mod headers;
pub mod metrics;
pub mod rate_limit;
pub mod routes;
pub mod security;
pub mod session;

use crate::config::{GatekeeperConfig, StoreKind};
use crate::error::{GatekeeperError, Result};
use crate::forward::{forward_handler, Forwarder};
use crate::gatekeeper::{gatekeeper_middleware, GatekeeperState};
use crate::headers::SecurityHeaders;
use crate::metrics::{metrics_handler, MetricsService};
use crate::rate_limit::{InMemoryStore, RateLimitStore, RateLimiterSet, RedisStore};
use crate::routes::RoutePolicy;
use crate::security::SecurityMonitor;
use crate::session::jwt::JwtSessionResolver;
use crate::session::{AnonymousResolver, SessionResolver};
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the gatekeeper state from configuration
pub async fn build_state(config: &GatekeeperConfig) -> Result<GatekeeperState> {
    let store: Arc<dyn RateLimitStore> = match config.rate_limits.store {
        StoreKind::Memory => {
            info!("Using in-memory rate limit store");
            Arc::new(InMemoryStore::new())
        }
        StoreKind::Redis => {
            let url = config.rate_limits.redis_url.as_deref().ok_or_else(|| {
                GatekeeperError::Config("redis_url is required for the redis store".to_string())
            })?;
            let store = RedisStore::new(url).await?;
            store.ping().await?;
            info!("Connected to Redis rate limit store");
            Arc::new(store)
        }
    };

    let limiters = RateLimiterSet::new(
        store,
        config.rate_limits.auth.clone(),
        config.rate_limits.admin.clone(),
        config.rate_limits.api.clone(),
    );

    let policy = RoutePolicy::new(config.routes.clone());

    let resolver: Arc<dyn SessionResolver> = match &config.session {
        Some(session) => Arc::new(JwtSessionResolver::new(session)),
        None => {
            info!("No session config; all requests treated as anonymous");
            Arc::new(AnonymousResolver)
        }
    };

    let monitor = SecurityMonitor::new(&config.security);

    let headers = SecurityHeaders::from_config(config.security.content_security_policy.as_deref());

    Ok(GatekeeperState::new(policy, limiters, monitor, resolver, headers))
}

/// Assemble the Axum application. `/metrics` is mounted outside the
/// gatekeeper layer: scrapes are never rate limited, authenticated or
/// decorated.
pub fn build_app(state: GatekeeperState, forwarder: Forwarder, metrics: MetricsService) -> Router {
    let gated = Router::new()
        .fallback(forward_handler)
        .with_state(forwarder)
        .layer(middleware::from_fn_with_state(state, gatekeeper_middleware));

    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .merge(gated)
        .layer(TraceLayer::new_for_http())
}

/// Initialize and run the gatekeeper server
pub async fn init_gatekeeper(config: GatekeeperConfig) -> Result<()> {
    config.validate()?;

    info!("Starting request gatekeeper");
    info!(
        "Server listening on {}:{}",
        config.server.host, config.server.port
    );
    info!("Upstream: {}", config.server.upstream);

    let state = build_state(&config).await?;
    let forwarder = Forwarder::new(
        &config.server.upstream,
        Duration::from_secs(config.server.timeout_secs),
    )?;

    let metrics_service = MetricsService::new()?;

    let app = build_app(state, forwarder, metrics_service);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(GatekeeperError::Io)?;

    info!("Gatekeeper ready to accept connections");

    axum::serve(listener, app)
        .await
        .map_err(|e| GatekeeperError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper=debug,tower_http=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
