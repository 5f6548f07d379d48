// ABOUTME: Axum middleware resolving the request Host header to a scope
// ABOUTME: Injects ResolvedScope and RequestOrigin into request extensions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::errors::AppError;
use crate::models::{RequestOrigin, Tenant};
use crate::server::ServerResources;
use crate::tenant::{resolve_scope, TenantScope};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolved scope wrapper for request extensions.
///
/// `None` means the host matched neither the platform host nor any active
/// tenant subdomain. The middleware does not reject such requests itself;
/// the scope guards in handlers do, so health checks stay reachable.
#[derive(Debug, Clone)]
pub struct ResolvedScope(pub Option<TenantScope>);

impl ResolvedScope {
    /// Scope if resolved
    #[must_use]
    pub const fn get(&self) -> Option<&TenantScope> {
        self.0.as_ref()
    }
}

/// Resolve the Host header to a scope and capture request provenance.
///
/// Inserts `ResolvedScope` and `RequestOrigin` into request extensions for
/// every request, including ones whose host resolves to nothing.
pub async fn scope_middleware(
    State(resources): State<Arc<ServerResources>>,
    mut req: Request,
    next: Next,
) -> Response {
    let headers = req.headers();

    let origin = RequestOrigin {
        ip: headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|ip| ip.trim().to_string()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(ToOwned::to_owned),
    };

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(ToOwned::to_owned);

    let scope = if let Some(host) = host {
        match resolve_scope(
            &resources.database,
            &host,
            &resources.config.platform_host,
            &resources.config.tenant_base_domain,
        )
        .await
        {
            Ok(scope) => {
                if scope.is_none() {
                    debug!(host = %host, "Host resolved to no scope");
                }
                scope
            }
            Err(e) => {
                warn!(host = %host, "Scope resolution failed: {e}");
                None
            }
        }
    } else {
        debug!("Request without Host header");
        None
    };

    if let Some(TenantScope::Tenant(ref tenant)) = scope {
        tracing::Span::current().record("tenant_id", tenant.id.to_string());
    }

    req.extensions_mut().insert(ResolvedScope(scope));
    req.extensions_mut().insert(origin);

    next.run(req).await
}

/// Require the request to be on an active tenant host
///
/// # Errors
/// Returns a permission error when the scope is missing or is the platform
pub fn require_tenant_scope(resolved: &ResolvedScope) -> Result<&Tenant, AppError> {
    match resolved.get() {
        Some(TenantScope::Tenant(tenant)) => Ok(tenant),
        _ => Err(AppError::forbidden(
            "This operation requires a tenant workspace host",
        )),
    }
}

/// Require the request to be on the platform host
///
/// # Errors
/// Returns a permission error when the scope is missing or is a tenant
pub fn require_platform_scope(resolved: &ResolvedScope) -> Result<(), AppError> {
    match resolved.get() {
        Some(TenantScope::Platform) => Ok(()),
        _ => Err(AppError::forbidden(
            "This operation requires the operator console host",
        )),
    }
}
