// ABOUTME: Authentication route handlers for login, refresh, logout, and portal entry
// ABOUTME: Thin axum wrappers delegating to AuthService, errors collapse to generic responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::auth::TokenPurpose;
use crate::bridge::RawBridgeToken;
use crate::errors::{AppError, AppResult};
use crate::middleware::{require_platform_scope, require_tenant_scope, ResolvedScope};
use crate::models::{
    AuthEvent, AuthEventKind, Principal, PrincipalKind, RequestOrigin, Tenant,
};
use crate::refresh_tokens::RawRefreshToken;
use crate::server::ServerResources;
use crate::tenant::{TenantScope, TenantSession};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub secret: String,
}

/// Principal info for login responses
#[derive(Debug, Serialize)]
pub struct PrincipalInfo {
    pub id: String,
    pub kind: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
}

/// Tenant info for login responses
#[derive(Debug, Serialize)]
pub struct TenantInfo {
    pub id: String,
    pub code: String,
    pub name: String,
}

impl TenantInfo {
    fn from_tenant(tenant: &Tenant) -> Self {
        Self {
            id: tenant.id.to_string(),
            code: tenant.code.clone(),
            name: tenant.name.clone(),
        }
    }
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub principal: PrincipalInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantInfo>,
}

/// Refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Logout request
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Logout response
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// Portal entry request carrying a bridge token
#[derive(Debug, Deserialize)]
pub struct PortalLoginRequest {
    pub bridge_token: String,
}

/// Portal entry response
#[derive(Debug, Serialize)]
pub struct PortalLoginResponse {
    pub access_token: String,
    pub expires_at: i64,
    pub purpose: TokenPurpose,
}

/// Authentication service for business logic
#[derive(Clone)]
pub struct AuthService {
    resources: Arc<ServerResources>,
}

impl AuthService {
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Handle a credential login on whichever scope the request arrived on.
    ///
    /// Unknown identifier, wrong secret, inactive principal, and
    /// out-of-scope principal all produce the identical generic error.
    ///
    /// # Errors
    /// Returns a rate-limit error when throttled, the generic credential
    /// error on any authentication failure, or a database error
    pub async fn login(
        &self,
        scope: &TenantScope,
        origin: &RequestOrigin,
        request: LoginRequest,
    ) -> AppResult<LoginResponse> {
        let tenant_id = scope.tenant_id();

        self.resources
            .rate_limiter
            .check_login_attempt(
                &self.resources.database,
                origin.ip.as_deref(),
                &request.identifier,
                tenant_id,
            )
            .await?;

        let principal = match scope {
            TenantScope::Platform => self
                .resources
                .database
                .get_operator_by_email(&request.identifier)
                .await?
                .map(Principal::PlatformOperator),
            TenantScope::Tenant(tenant) => {
                let mut session =
                    TenantSession::open(&self.resources.database, tenant.id).await?;
                session
                    .find_user_by_email(&request.identifier)
                    .await?
                    .map(Principal::TenantUser)
            }
        };

        let Some(principal) = principal else {
            self.record_login_failure(&request.identifier, tenant_id, origin, "unknown principal")
                .await;
            return Err(AppError::auth_invalid());
        };

        let verified = verify_password(&request.secret, principal.password_hash()).await?;
        if !verified {
            self.record_login_failure(&request.identifier, tenant_id, origin, "secret mismatch")
                .await;
            return Err(AppError::auth_invalid());
        }

        if !principal.is_active() {
            self.record_login_failure(&request.identifier, tenant_id, origin, "inactive principal")
                .await;
            return Err(AppError::auth_invalid());
        }

        let (access_token, expires_at) = self
            .resources
            .auth_manager
            .issue_session_token(&principal, tenant_id)?;

        let issued = self
            .resources
            .refresh_tokens
            .issue(
                &self.resources.database,
                principal.kind(),
                principal.id(),
                tenant_id,
                origin,
            )
            .await?;

        self.touch_last_login(&principal).await;

        let event = AuthEvent::now(AuthEventKind::LoginSuccess)
            .with_identifier(&request.identifier)
            .with_principal_kind(principal.kind())
            .with_origin(origin);
        let event = match tenant_id {
            Some(t) => event.with_tenant(t),
            None => event,
        };
        if let Err(e) = self.resources.database.record_auth_event(&event).await {
            tracing::warn!("Failed to record login event: {e}");
        }

        tracing::info!(
            principal = %principal.id(),
            kind = %principal.kind(),
            "Login successful"
        );

        Ok(LoginResponse {
            access_token,
            refresh_token: issued.token,
            expires_at,
            principal: PrincipalInfo {
                id: principal.id().to_string(),
                kind: principal.kind().as_str().to_string(),
                email: principal.email().to_string(),
                display_name: principal.display_name().map(ToOwned::to_owned),
                role: principal.role_str(),
            },
            tenant: match scope {
                TenantScope::Platform => None,
                TenantScope::Tenant(tenant) => Some(TenantInfo::from_tenant(tenant)),
            },
        })
    }

    /// Rotate a refresh token and mint a fresh access token.
    ///
    /// The token's tenant binding must match the host it is presented on.
    /// A mismatch is a scope violation and leaves the token alone; all
    /// credential defects collapse to the generic error.
    ///
    /// # Errors
    /// Returns a permission error on a host mismatch, the generic
    /// credential error otherwise
    pub async fn refresh(
        &self,
        scope: &TenantScope,
        origin: &RequestOrigin,
        request: RefreshRequest,
    ) -> AppResult<RefreshResponse> {
        let raw = RawRefreshToken::parse(&request.refresh_token)?;

        // Possession and the scope cross-check first, without touching the
        // token's state, so one presented on the wrong host is not burned.
        // Rotation then sees the state itself and treats a dead token as
        // reuse, revoking the lineage.
        let record = self
            .resources
            .refresh_tokens
            .inspect(&self.resources.database, &raw)
            .await?;

        if record.tenant_id != scope.tenant_id() {
            tracing::warn!(
                token_tenant = ?record.tenant_id,
                host_tenant = ?scope.tenant_id(),
                "Refresh token presented on wrong host"
            );
            return Err(AppError::forbidden("Token is not valid for this host"));
        }

        let (issued, rotated) = self
            .resources
            .refresh_tokens
            .rotate(&self.resources.database, &raw, origin)
            .await?;

        let principal = self.load_principal(&rotated.principal_kind, rotated.principal_id).await?;
        if !principal.is_active() {
            // Principal was deactivated since the last refresh. Close the
            // lineage so the remaining chain is dead too.
            self.close_lineage(rotated.lineage_id).await;
            return Err(AppError::auth_invalid());
        }

        if let (PrincipalKind::TenantUser, Some(tenant_id)) =
            (rotated.principal_kind, rotated.tenant_id)
        {
            let member = self
                .resources
                .database
                .user_belongs_to_tenant(rotated.principal_id, tenant_id)
                .await?;
            if !member {
                // Membership was withdrawn since issue; the chain ends here
                self.close_lineage(rotated.lineage_id).await;
                return Err(AppError::auth_invalid());
            }
        }

        let (access_token, expires_at) = self
            .resources
            .auth_manager
            .issue_session_token(&principal, rotated.tenant_id)?;

        Ok(RefreshResponse {
            access_token,
            refresh_token: issued.token,
            expires_at,
        })
    }

    /// Revoke a refresh token at logout
    ///
    /// # Errors
    /// Returns the generic credential error when possession is not proven
    pub async fn logout(
        &self,
        origin: &RequestOrigin,
        request: LogoutRequest,
    ) -> AppResult<LogoutResponse> {
        let raw = RawRefreshToken::parse(&request.refresh_token)?;
        self.resources
            .refresh_tokens
            .revoke(&self.resources.database, &raw, origin)
            .await?;
        Ok(LogoutResponse {
            message: "Logged out".into(),
        })
    }

    /// Redeem a bridge token on a tenant host for an impersonation session
    ///
    /// # Errors
    /// Returns a permission error for a host mismatch and the generic
    /// credential error for any dead or unknown token
    pub async fn portal_login(
        &self,
        tenant: &Tenant,
        origin: &RequestOrigin,
        request: PortalLoginRequest,
    ) -> AppResult<PortalLoginResponse> {
        let raw = RawBridgeToken::parse(&request.bridge_token)?;
        let redeemed = self
            .resources
            .bridge
            .redeem(
                &self.resources.database,
                &self.resources.auth_manager,
                &raw,
                tenant,
                origin,
            )
            .await?;

        Ok(PortalLoginResponse {
            access_token: redeemed.access_token,
            expires_at: redeemed.expires_at,
            purpose: TokenPurpose::Impersonation,
        })
    }

    async fn close_lineage(&self, lineage_id: Uuid) {
        if let Err(e) = self
            .resources
            .database
            .revoke_refresh_lineage(lineage_id, chrono::Utc::now())
            .await
        {
            tracing::error!(lineage = %lineage_id, "Failed to revoke lineage: {e}");
        }
    }

    async fn load_principal(
        &self,
        kind: &PrincipalKind,
        principal_id: Uuid,
    ) -> AppResult<Principal> {
        match kind {
            PrincipalKind::TenantUser => self
                .resources
                .database
                .get_tenant_user_by_id(principal_id)
                .await?
                .map(Principal::TenantUser)
                .ok_or_else(AppError::auth_invalid),
            PrincipalKind::PlatformOperator => self
                .resources
                .database
                .get_operator_by_id(principal_id)
                .await?
                .map(Principal::PlatformOperator)
                .ok_or_else(AppError::auth_invalid),
        }
    }

    async fn touch_last_login(&self, principal: &Principal) {
        let result = match principal {
            Principal::TenantUser(u) => {
                self.resources
                    .database
                    .update_tenant_user_last_login(u.id)
                    .await
            }
            Principal::PlatformOperator(o) => {
                self.resources
                    .database
                    .update_operator_last_login(o.id)
                    .await
            }
        };
        if let Err(e) = result {
            tracing::warn!("Failed to update last login: {e}");
        }
    }

    async fn record_login_failure(
        &self,
        identifier: &str,
        tenant_id: Option<Uuid>,
        origin: &RequestOrigin,
        reason: &str,
    ) {
        // The reason stays in the log and the event payload, never the response
        tracing::warn!(identifier, reason, "Login failed");
        let event = AuthEvent::now(AuthEventKind::LoginFailure)
            .with_identifier(identifier)
            .with_origin(origin)
            .with_detail(serde_json::json!({ "reason": reason }));
        let event = match tenant_id {
            Some(t) => event.with_tenant(t),
            None => event,
        };
        if let Err(e) = self.resources.database.record_auth_event(&event).await {
            tracing::warn!("Failed to record login failure: {e}");
        }
    }
}

/// Verify a password against a bcrypt hash off the async executor
///
/// # Errors
/// Returns an internal error if the verification task fails
async fn verify_password(secret: &str, password_hash: &str) -> AppResult<bool> {
    let secret = secret.to_owned();
    let password_hash = password_hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(&secret, &password_hash))
        .await
        .map_err(|e| AppError::internal(format!("Password verification task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Password verification error: {e}")))
}

fn require_scope(resolved: &ResolvedScope) -> AppResult<&TenantScope> {
    resolved
        .get()
        .ok_or_else(|| AppError::forbidden("Unknown host"))
}

/// POST /auth/login
///
/// # Errors
/// Returns an error response per the service failure modes
pub async fn login_handler(
    State(resources): State<Arc<ServerResources>>,
    Extension(scope): Extension<ResolvedScope>,
    Extension(origin): Extension<RequestOrigin>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let scope = require_scope(&scope)?;
    let service = AuthService::new(resources);
    Ok(Json(service.login(scope, &origin, request).await?))
}

/// POST /auth/refresh
///
/// # Errors
/// Returns an error response per the service failure modes
pub async fn refresh_handler(
    State(resources): State<Arc<ServerResources>>,
    Extension(scope): Extension<ResolvedScope>,
    Extension(origin): Extension<RequestOrigin>,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let scope = require_scope(&scope)?;
    let service = AuthService::new(resources);
    Ok(Json(service.refresh(scope, &origin, request).await?))
}

/// POST /auth/logout
///
/// # Errors
/// Returns an error response per the service failure modes
pub async fn logout_handler(
    State(resources): State<Arc<ServerResources>>,
    Extension(origin): Extension<RequestOrigin>,
    Json(request): Json<LogoutRequest>,
) -> AppResult<Json<LogoutResponse>> {
    let service = AuthService::new(resources);
    Ok(Json(service.logout(&origin, request).await?))
}

/// POST /operator/auth/login - console login, platform host only
///
/// # Errors
/// Returns a permission error off the platform host, then the service
/// failure modes
pub async fn console_login_handler(
    State(resources): State<Arc<ServerResources>>,
    Extension(scope): Extension<ResolvedScope>,
    Extension(origin): Extension<RequestOrigin>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    require_platform_scope(&scope)?;
    let service = AuthService::new(resources);
    Ok(Json(
        service.login(&TenantScope::Platform, &origin, request).await?,
    ))
}

/// POST /operator/auth/refresh - console refresh, platform host only
///
/// # Errors
/// Returns a permission error off the platform host, then the service
/// failure modes
pub async fn console_refresh_handler(
    State(resources): State<Arc<ServerResources>>,
    Extension(scope): Extension<ResolvedScope>,
    Extension(origin): Extension<RequestOrigin>,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    require_platform_scope(&scope)?;
    let service = AuthService::new(resources);
    Ok(Json(
        service.refresh(&TenantScope::Platform, &origin, request).await?,
    ))
}

/// POST /operator/auth/logout - console logout, platform host only
///
/// # Errors
/// Returns a permission error off the platform host, then the service
/// failure modes
pub async fn console_logout_handler(
    State(resources): State<Arc<ServerResources>>,
    Extension(scope): Extension<ResolvedScope>,
    Extension(origin): Extension<RequestOrigin>,
    Json(request): Json<LogoutRequest>,
) -> AppResult<Json<LogoutResponse>> {
    require_platform_scope(&scope)?;
    let service = AuthService::new(resources);
    Ok(Json(service.logout(&origin, request).await?))
}

/// POST /auth/portal-login - bridge-token redemption on a tenant host
///
/// # Errors
/// Returns an error response per the service failure modes
pub async fn portal_login_handler(
    State(resources): State<Arc<ServerResources>>,
    Extension(scope): Extension<ResolvedScope>,
    Extension(origin): Extension<RequestOrigin>,
    Json(request): Json<PortalLoginRequest>,
) -> AppResult<Json<PortalLoginResponse>> {
    let tenant = require_tenant_scope(&scope)?.clone();
    let service = AuthService::new(resources);
    Ok(Json(service.portal_login(&tenant, &origin, request).await?))
}
