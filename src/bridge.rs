// ABOUTME: One-time bridge tokens carrying an operator into a tenant workspace
// ABOUTME: Short-lived, hash-stored, redeemed at most once on the matching tenant host
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::auth::AuthManager;
use crate::config::BRIDGE_TTL_CEILING_SECS;
use crate::crypto::{
    generate_token_secret, hash_token_secret, verify_token_secret, TOKEN_SECRET_HEX_LEN,
};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AuthEvent, AuthEventKind, BridgeTokenRecord, PlatformOperator, PrincipalKind, RequestOrigin,
    Tenant,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

/// A bridge token as handed to the operator's browser: `<record id>.<secret>`
#[derive(Debug, Clone)]
pub struct RawBridgeToken {
    /// Record id half
    pub id: Uuid,
    /// Secret half, 64 lowercase hex chars
    pub secret: String,
}

impl RawBridgeToken {
    /// Parse the wire form. Structural defects yield the generic credential
    /// error before any database access.
    ///
    /// # Errors
    /// Returns a generic authentication error for malformed input
    pub fn parse(raw: &str) -> AppResult<Self> {
        let (id_part, secret_part) = raw.split_once('.').ok_or_else(AppError::auth_invalid)?;
        let id = Uuid::parse_str(id_part).map_err(|_| AppError::auth_invalid())?;
        if secret_part.len() != TOKEN_SECRET_HEX_LEN
            || !secret_part.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
        {
            return Err(AppError::auth_invalid());
        }
        Ok(Self {
            id,
            secret: secret_part.to_string(),
        })
    }
}

/// Freshly minted bridge handoff: wire token plus where to take it
#[derive(Debug)]
pub struct IssuedBridge {
    /// Opaque wire token, shown to the operator exactly once
    pub token: String,
    /// Tenant host the token must be redeemed on
    pub redirect_host: String,
    /// Unix timestamp the token stops working
    pub expires_at: i64,
    /// Target tenant
    pub tenant: Tenant,
}

/// Result of redeeming a bridge token on a tenant host
#[derive(Debug)]
pub struct RedeemedBridge {
    /// Impersonation access token for the tenant workspace
    pub access_token: String,
    /// Unix expiry of the access token
    pub expires_at: i64,
    /// Operator behind the session
    pub operator_id: Uuid,
    /// Tenant the session is scoped to
    pub tenant_id: Uuid,
}

/// One-time handoff from the operator console into a tenant workspace.
///
/// A bridge token is the only path by which a platform session turns into a
/// tenant session. It lives for seconds, is stored hashed, binds to exactly
/// one tenant, and dies on first redemption.
#[derive(Debug, Clone)]
pub struct ImpersonationBridge {
    ttl_secs: i64,
    tenant_base_domain: String,
}

impl ImpersonationBridge {
    /// Build with a configured lifetime, capped at the hard ceiling
    #[must_use]
    pub fn new(ttl_secs: i64, tenant_base_domain: impl Into<String>) -> Self {
        Self {
            ttl_secs: ttl_secs.min(BRIDGE_TTL_CEILING_SECS),
            tenant_base_domain: tenant_base_domain.into(),
        }
    }

    /// Mint a bridge token for an operator targeting a tenant.
    ///
    /// # Errors
    /// Returns a permission error when the operator role cannot impersonate,
    /// a not-found error for missing or inactive tenants, or a database
    /// error on persistence failure
    pub async fn issue(
        &self,
        database: &Database,
        operator: &PlatformOperator,
        tenant_id: Uuid,
        origin: &RequestOrigin,
    ) -> AppResult<IssuedBridge> {
        if !operator.role.can_impersonate() {
            return Err(AppError::forbidden(
                "Operator role does not permit tenant impersonation",
            ));
        }

        let tenant = database
            .get_tenant_by_id(tenant_id)
            .await?
            .filter(|t| t.is_active)
            .ok_or_else(|| AppError::not_found("tenant"))?;

        let subdomain = tenant
            .subdomain
            .clone()
            .ok_or_else(|| AppError::invalid_input("Tenant has no portal subdomain"))?;

        let secret = generate_token_secret()?;
        let now = Utc::now();
        let record = BridgeTokenRecord {
            id: Uuid::new_v4(),
            operator_id: operator.id,
            tenant_id: tenant.id,
            secret_hash: hash_token_secret(&secret),
            expires_at: now + Duration::seconds(self.ttl_secs),
            consumed_at: None,
            created_at: now,
            issued_from_ip: origin.ip.clone(),
            consumed_from_ip: None,
        };
        database.insert_bridge_token(&record).await?;

        database
            .record_audit_event(
                operator.id,
                "bridge_issued",
                Some(tenant.id),
                Some(&serde_json::json!({ "bridge_id": record.id })),
                origin.ip.as_deref(),
                now,
            )
            .await?;

        let event = AuthEvent::now(AuthEventKind::BridgeIssued)
            .with_principal_kind(PrincipalKind::PlatformOperator)
            .with_tenant(tenant.id)
            .with_origin(origin)
            .with_detail(serde_json::json!({
                "bridge_id": record.id,
                "operator_id": operator.id,
            }));
        if let Err(e) = database.record_auth_event(&event).await {
            tracing::warn!("Failed to record bridge issue event: {e}");
        }

        tracing::info!(
            operator = %operator.id,
            tenant = %tenant.id,
            "Bridge token issued"
        );

        Ok(IssuedBridge {
            token: format!("{}.{secret}", record.id),
            redirect_host: format!("{subdomain}.{}", self.tenant_base_domain),
            expires_at: record.expires_at.timestamp(),
            tenant,
        })
    }

    /// Redeem a bridge token on a tenant host.
    ///
    /// Possession is checked first in constant time, then the state of the
    /// record. A token presented on the wrong tenant host is a scope
    /// mismatch and stays unconsumed; the operator can still redeem it on
    /// the right host within the lifetime. All other failures collapse to
    /// the generic credential error.
    ///
    /// # Errors
    /// Returns a generic authentication error for dead, expired, or unknown
    /// tokens and a permission error for a tenant-host mismatch
    pub async fn redeem(
        &self,
        database: &Database,
        auth: &AuthManager,
        raw: &RawBridgeToken,
        host_tenant: &Tenant,
        origin: &RequestOrigin,
    ) -> AppResult<RedeemedBridge> {
        let record = database
            .get_bridge_token(raw.id)
            .await?
            .ok_or_else(AppError::auth_invalid)?;

        if !verify_token_secret(&raw.secret, &record.secret_hash) {
            return Err(AppError::auth_invalid());
        }

        if record.tenant_id != host_tenant.id {
            tracing::warn!(
                bridge = %record.id,
                expected = %record.tenant_id,
                presented_on = %host_tenant.id,
                "Bridge token presented on wrong tenant host"
            );
            return Err(AppError::forbidden("Token is not valid for this workspace"));
        }

        let now = Utc::now();
        if record.is_consumed() || record.is_expired(now) {
            return Err(AppError::auth_invalid());
        }

        // Conditional update is the arbiter under concurrent redemption
        let consumed = database
            .consume_bridge_token(record.id, now, origin.ip.as_deref())
            .await?;
        if !consumed {
            return Err(AppError::auth_invalid());
        }

        let operator = database
            .get_operator_by_id(record.operator_id)
            .await?
            .filter(|o| o.is_active)
            .ok_or_else(AppError::auth_invalid)?;

        let (access_token, expires_at) =
            auth.issue_impersonation_token(operator.id, operator.role.as_str(), record.tenant_id)?;

        database
            .record_audit_event(
                operator.id,
                "bridge_redeemed",
                Some(record.tenant_id),
                Some(&serde_json::json!({ "bridge_id": record.id })),
                origin.ip.as_deref(),
                now,
            )
            .await?;

        let event = AuthEvent::now(AuthEventKind::BridgeRedeemed)
            .with_principal_kind(PrincipalKind::PlatformOperator)
            .with_tenant(record.tenant_id)
            .with_origin(origin)
            .with_detail(serde_json::json!({
                "bridge_id": record.id,
                "operator_id": operator.id,
            }));
        if let Err(e) = database.record_auth_event(&event).await {
            tracing::warn!("Failed to record bridge redeem event: {e}");
        }

        tracing::info!(
            operator = %operator.id,
            tenant = %record.tenant_id,
            "Bridge token redeemed"
        );

        Ok(RedeemedBridge {
            access_token,
            expires_at,
            operator_id: operator.id,
            tenant_id: record.tenant_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_capped_at_ceiling() {
        let bridge = ImpersonationBridge::new(3600, "limsgate.local");
        assert_eq!(bridge.ttl_secs, BRIDGE_TTL_CEILING_SECS);

        let bridge = ImpersonationBridge::new(90, "limsgate.local");
        assert_eq!(bridge.ttl_secs, 90);
    }

    #[test]
    fn raw_bridge_token_parse_mirrors_refresh_format() {
        assert!(RawBridgeToken::parse("garbage").is_err());
        let id = Uuid::new_v4();
        let secret = "f".repeat(TOKEN_SECRET_HEX_LEN);
        let parsed = RawBridgeToken::parse(&format!("{id}.{secret}")).unwrap();
        assert_eq!(parsed.id, id);
    }
}
