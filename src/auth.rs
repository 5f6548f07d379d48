// ABOUTME: Access-token minting and validation for tenant users and operators
// ABOUTME: HS256 JWTs carrying principal kind, role, tenant binding, and purpose
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::config::SigningKeys;
use crate::errors::{AppError, AppResult};
use crate::models::{Principal, PrincipalKind};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Audience stamped into every access token
pub const AUDIENCE: &str = "limsgate";

/// Why an access token was minted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Ordinary interactive session
    Session,
    /// Operator acting inside a tenant through the bridge
    Impersonation,
}

/// `JWT` claims for an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal `ID`
    pub sub: String,
    /// Principal kind (`tenant_user` or `platform_operator`)
    pub kind: String,
    /// Role within the scope
    pub role: String,
    /// Tenant the session is bound to, absent for platform sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Session or impersonation
    pub purpose: TokenPurpose,
    /// Operator behind an impersonation session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impersonator: Option<String>,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Audience (who the token is intended for)
    pub aud: String,
}

impl Claims {
    /// Parse the subject back into a `Uuid`
    ///
    /// # Errors
    /// Returns an error when the subject is not a valid `UUID`
    pub fn principal_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::auth_invalid())
    }

    /// Parse the tenant binding, if present
    ///
    /// # Errors
    /// Returns an error when the tenant claim is not a valid `UUID`
    pub fn tenant_binding(&self) -> AppResult<Option<Uuid>> {
        self.tenant_id
            .as_deref()
            .map(|t| Uuid::parse_str(t).map_err(|_| AppError::auth_invalid()))
            .transpose()
    }
}

/// Authentication manager for access tokens
pub struct AuthManager {
    signing: SigningKeys,
    access_ttl_secs: i64,
    /// Monotonic counter to ensure unique issued-at values for tokens
    token_counter: AtomicU64,
}

impl Clone for AuthManager {
    fn clone(&self) -> Self {
        Self {
            signing: self.signing.clone(),
            access_ttl_secs: self.access_ttl_secs,
            // Fresh counter per instance, each maintains uniqueness independently
            token_counter: AtomicU64::new(0),
        }
    }
}

impl AuthManager {
    /// Create a new authentication manager
    #[must_use]
    pub const fn new(signing: SigningKeys, access_ttl_secs: i64) -> Self {
        Self {
            signing,
            access_ttl_secs,
            token_counter: AtomicU64::new(0),
        }
    }

    /// Access-token lifetime in seconds
    #[must_use]
    pub const fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Mint an ordinary session access token for a principal
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn issue_session_token(
        &self,
        principal: &Principal,
        tenant_id: Option<Uuid>,
    ) -> AppResult<(String, i64)> {
        self.issue_token(
            principal.id(),
            principal.kind(),
            &principal.role_str(),
            tenant_id,
            TokenPurpose::Session,
            None,
        )
    }

    /// Mint an impersonation token: the operator acting inside a tenant.
    /// The subject stays the operator so every action remains attributable.
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn issue_impersonation_token(
        &self,
        operator_id: Uuid,
        role: &str,
        tenant_id: Uuid,
    ) -> AppResult<(String, i64)> {
        self.issue_token(
            operator_id,
            PrincipalKind::PlatformOperator,
            role,
            Some(tenant_id),
            TokenPurpose::Impersonation,
            Some(operator_id),
        )
    }

    fn issue_token(
        &self,
        principal_id: Uuid,
        kind: PrincipalKind,
        role: &str,
        tenant_id: Option<Uuid>,
        purpose: TokenPurpose,
        impersonator: Option<Uuid>,
    ) -> AppResult<(String, i64)> {
        let now = Utc::now();
        let expiry = now + Duration::seconds(self.access_ttl_secs);

        // Atomic counter keeps issued-at values unique under bursts
        let counter = self.token_counter.fetch_add(1, Ordering::Relaxed);
        let unique_iat =
            now.timestamp() * 1000 + i64::from(u32::try_from(counter % 1000).unwrap_or(0));

        let claims = Claims {
            sub: principal_id.to_string(),
            kind: kind.as_str().to_string(),
            role: role.to_string(),
            tenant_id: tenant_id.map(|t| t.to_string()),
            purpose,
            impersonator: impersonator.map(|i| i.to_string()),
            iat: unique_iat,
            exp: expiry.timestamp(),
            aud: AUDIENCE.to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.signing.secret()),
        )
        .map_err(|e| AppError::internal(format!("Token encoding failed: {e}")))?;

        Ok((token, expiry.timestamp()))
    }

    /// Validate an access token and return its claims.
    ///
    /// Every failure mode collapses to the same generic credential error so
    /// callers cannot distinguish expired from forged from malformed.
    ///
    /// # Errors
    /// Returns a generic authentication error for any invalid token
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[AUDIENCE]);

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.signing.secret()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!("Access token validation failed: {e}");
            AppError::auth_invalid()
        })?;

        Ok(token_data.claims)
    }
}
