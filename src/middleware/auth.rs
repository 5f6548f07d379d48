// ABOUTME: Bearer-token authentication helpers for route handlers
// ABOUTME: Validates access tokens and cross-checks their scope against the host
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::auth::Claims;
use crate::errors::{AppError, AppResult};
use crate::models::{PlatformOperator, PrincipalKind};
use crate::server::ServerResources;
use crate::tenant::TenantScope;
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::warn;

/// Extract and validate the bearer token from request headers.
///
/// # Errors
/// Returns an authentication-required error when the header is absent and
/// the generic credential error when the token does not validate
pub fn authenticate_request(
    resources: &Arc<ServerResources>,
    headers: &HeaderMap,
) -> AppResult<Claims> {
    let token = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .ok_or_else(AppError::auth_required)?;

    resources.auth_manager.validate_token(token)
}

/// Cross-check an authenticated session against the host scope it arrived
/// on. A session minted for one tenant presented on another tenant's host,
/// or a platform session presented on a tenant host without impersonation,
/// is a scope violation.
///
/// # Errors
/// Returns a permission error on any mismatch
pub fn require_scope_match(claims: &Claims, scope: &TenantScope) -> AppResult<()> {
    let bound = claims.tenant_binding()?;
    match (scope, bound) {
        (TenantScope::Platform, None) => Ok(()),
        (TenantScope::Tenant(tenant), Some(session_tenant)) if tenant.id == session_tenant => {
            Ok(())
        }
        _ => {
            warn!(
                session_tenant = ?bound,
                host_tenant = ?scope.tenant_id(),
                "Session scope does not match request host"
            );
            Err(AppError::forbidden("Session is not valid for this host"))
        }
    }
}

/// Require the session to belong to an active platform operator, returning
/// the operator record.
///
/// # Errors
/// Returns a permission error for non-operator sessions and the generic
/// credential error when the operator no longer exists or is inactive
pub async fn require_platform_operator(
    resources: &Arc<ServerResources>,
    claims: &Claims,
) -> AppResult<PlatformOperator> {
    if claims.kind != PrincipalKind::PlatformOperator.as_str() {
        return Err(AppError::forbidden("Operator session required"));
    }
    let operator_id = claims.principal_id()?;
    resources
        .database
        .get_operator_by_id(operator_id)
        .await?
        .filter(|o| o.is_active)
        .ok_or_else(AppError::auth_invalid)
}
