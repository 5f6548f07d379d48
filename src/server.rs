// ABOUTME: Shared server resources, router assembly, and the serve loop
// ABOUTME: Every handler reaches its dependencies through Arc<ServerResources>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::auth::AuthManager;
use crate::bridge::ImpersonationBridge;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::middleware::scope_middleware;
use crate::rate_limiting::LoginRateLimiter;
use crate::refresh_tokens::RefreshTokenManager;
use crate::routes;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared dependencies for every request handler
pub struct ServerResources {
    /// Persistent store
    pub database: Database,
    /// Access-token signer and validator
    pub auth_manager: AuthManager,
    /// Login throttle
    pub rate_limiter: LoginRateLimiter,
    /// Refresh-token lifecycle
    pub refresh_tokens: RefreshTokenManager,
    /// Operator-to-tenant handoff
    pub bridge: ImpersonationBridge,
    /// Resolved configuration
    pub config: ServerConfig,
}

impl ServerResources {
    /// Wire up every subsystem from configuration and an open database
    #[must_use]
    pub fn new(database: Database, config: ServerConfig) -> Self {
        let auth_manager = AuthManager::new(config.signing.clone(), config.access_token_ttl_secs);
        let rate_limiter = LoginRateLimiter::new(config.rate_limit.clone());
        let refresh_tokens = RefreshTokenManager::new(config.refresh_token_ttl_days);
        let bridge =
            ImpersonationBridge::new(config.bridge.ttl_secs, config.tenant_base_domain.clone());
        Self {
            database,
            auth_manager,
            rate_limiter,
            refresh_tokens,
            bridge,
            config,
        }
    }
}

/// Assemble the application router with all middleware layers
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(routes::health::health_handler))
        .route("/auth/login", post(routes::auth::login_handler))
        .route("/auth/refresh", post(routes::auth::refresh_handler))
        .route("/auth/logout", post(routes::auth::logout_handler))
        .route(
            "/auth/portal-login",
            post(routes::auth::portal_login_handler),
        )
        // Console mirrors pinned to the platform host
        .route(
            "/operator/auth/login",
            post(routes::auth::console_login_handler),
        )
        .route(
            "/operator/auth/refresh",
            post(routes::auth::console_refresh_handler),
        )
        .route(
            "/operator/auth/logout",
            post(routes::auth::console_logout_handler),
        )
        .route(
            "/operator/impersonation/open-tenant",
            post(routes::operator::open_tenant_handler),
        )
        .layer(middleware::from_fn_with_state(
            resources.clone(),
            scope_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors)
        .with_state(resources)
}

/// Serve until the listener fails or the process is stopped
///
/// # Errors
/// Returns an error when binding or serving fails
pub async fn run_server(resources: Arc<ServerResources>) -> AppResult<()> {
    let port = resources.config.http_port;
    let router = build_router(resources);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind port {port}: {e}")))?;

    info!(port, "Server listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))
}
