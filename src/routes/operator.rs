// ABOUTME: Operator console route handlers, reachable only on the platform host
// ABOUTME: Issues one-time bridge tokens that carry an operator into a tenant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::errors::{AppError, AppResult};
use crate::middleware::{
    authenticate_request, require_platform_operator, require_platform_scope, require_scope_match,
    ResolvedScope,
};
use crate::models::RequestOrigin;
use crate::server::ServerResources;
use axum::{extract::State, http::HeaderMap, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Request to open a tenant workspace as an operator
#[derive(Debug, Deserialize)]
pub struct OpenTenantRequest {
    pub tenant_id: String,
}

/// Target tenant details in the bridge response
#[derive(Debug, Serialize)]
pub struct BridgeTenantInfo {
    pub id: String,
    pub code: String,
    pub name: String,
    pub redirect_host: String,
}

/// Bridge handoff response. The token appears here once and nowhere else.
#[derive(Debug, Serialize)]
pub struct OpenTenantResponse {
    pub bridge_token: String,
    pub expires_at: i64,
    pub tenant: BridgeTenantInfo,
}

/// POST /operator/impersonation/open-tenant
///
/// # Errors
/// Returns a permission error off the platform host or for roles without
/// impersonation rights, a not-found error for missing or inactive tenants
pub async fn open_tenant_handler(
    State(resources): State<Arc<ServerResources>>,
    Extension(scope): Extension<ResolvedScope>,
    Extension(origin): Extension<RequestOrigin>,
    headers: HeaderMap,
    Json(request): Json<OpenTenantRequest>,
) -> AppResult<Json<OpenTenantResponse>> {
    require_platform_scope(&scope)?;

    let claims = authenticate_request(&resources, &headers)?;
    let platform = scope
        .get()
        .ok_or_else(|| AppError::forbidden("Unknown host"))?;
    require_scope_match(&claims, platform)?;
    let operator = require_platform_operator(&resources, &claims).await?;

    let tenant_id = Uuid::parse_str(&request.tenant_id)
        .map_err(|_| AppError::invalid_input("Invalid tenant id"))?;

    let issued = resources
        .bridge
        .issue(&resources.database, &operator, tenant_id, &origin)
        .await?;

    Ok(Json(OpenTenantResponse {
        bridge_token: issued.token,
        expires_at: issued.expires_at,
        tenant: BridgeTenantInfo {
            id: issued.tenant.id.to_string(),
            code: issued.tenant.code.clone(),
            name: issued.tenant.name.clone(),
            redirect_host: issued.redirect_host,
        },
    }))
}
