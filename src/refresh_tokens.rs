// ABOUTME: Refresh-token lifecycle: issue, rotate with lineage tracking, revoke
// ABOUTME: Presenting a rotated or revoked token burns its whole lineage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::crypto::{
    generate_token_secret, hash_token_secret, verify_token_secret, TOKEN_SECRET_HEX_LEN,
};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{AuthEvent, AuthEventKind, PrincipalKind, RefreshTokenRecord, RequestOrigin};
use chrono::{Duration, Utc};
use uuid::Uuid;

/// A refresh token as presented on the wire: `<record id>.<secret>`.
///
/// The id locates the record, the secret proves possession. Structural
/// checks happen before any database access so garbage never costs a query.
#[derive(Debug, Clone)]
pub struct RawRefreshToken {
    /// Record id half
    pub id: Uuid,
    /// Secret half, 64 lowercase hex chars
    pub secret: String,
}

impl RawRefreshToken {
    /// Parse the wire form. Any structural defect yields the same generic
    /// credential error.
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

    /// Wire form handed to the client
    #[must_use]
    pub fn compose(id: Uuid, secret: &str) -> String {
        format!("{id}.{secret}")
    }
}

/// Outcome of issuing or rotating: the wire token plus its stored record
#[derive(Debug)]
pub struct IssuedRefreshToken {
    /// Opaque wire token for the client. The secret inside is not recoverable
    /// from storage.
    pub token: String,
    /// The persisted record (hash only)
    pub record: RefreshTokenRecord,
}

/// Manages the refresh-token side of the session lifecycle
#[derive(Debug, Clone)]
pub struct RefreshTokenManager {
    ttl_days: i64,
}

impl RefreshTokenManager {
    #[must_use]
    pub const fn new(ttl_days: i64) -> Self {
        Self { ttl_days }
    }

    /// Issue a fresh token starting a new lineage
    ///
    /// # Errors
    /// Returns an error if secret generation or persistence fails
    pub async fn issue(
        &self,
        database: &Database,
        principal_kind: PrincipalKind,
        principal_id: Uuid,
        tenant_id: Option<Uuid>,
        origin: &RequestOrigin,
    ) -> AppResult<IssuedRefreshToken> {
        let issued = self.build_token(principal_kind, principal_id, Uuid::new_v4(), tenant_id, origin)?;
        database.insert_refresh_token(&issued.record).await?;
        Ok(issued)
    }

    /// Rotate a presented token: retire it and hand back its successor.
    ///
    /// A token that is revoked or already rotated is treated as evidence of
    /// theft. The entire lineage is revoked before the caller sees the
    /// generic credential error, so neither the legitimate client nor the
    /// thief can continue. A wrong secret on a live record fails without
    /// side effects; the presenter proved nothing.
    ///
    /// # Errors
    /// Returns a generic authentication error for any dead, expired, or
    /// mismatched token
    pub async fn rotate(
        &self,
        database: &Database,
        raw: &RawRefreshToken,
        origin: &RequestOrigin,
    ) -> AppResult<(IssuedRefreshToken, RefreshTokenRecord)> {
        let record = database
            .get_refresh_token(raw.id)
            .await?
            .ok_or_else(AppError::auth_invalid)?;

        if !verify_token_secret(&raw.secret, &record.secret_hash) {
            // Possession was not proven. No lineage action on a bad guess.
            return Err(AppError::auth_invalid());
        }

        let now = Utc::now();

        if record.revoked_at.is_some() || record.replaced_by_id.is_some() {
            self.burn_lineage(database, &record, origin).await;
            return Err(AppError::auth_invalid());
        }

        if record.is_expired(now) {
            // Natural death, not theft. Close out just this token.
            if let Err(e) = database.revoke_refresh_token(record.id, now).await {
                tracing::warn!(token = %record.id, "Failed to revoke expired token: {e}");
            }
            return Err(AppError::auth_invalid());
        }

        let successor = self.build_token(
            record.principal_kind,
            record.principal_id,
            record.lineage_id,
            record.tenant_id,
            origin,
        )?;

        let won = database
            .rotate_refresh_token(record.id, &successor.record, now)
            .await?;
        if !won {
            // Another rotation of this token got there first. That means the
            // token was presented twice, which is the reuse signature.
            self.burn_lineage(database, &record, origin).await;
            return Err(AppError::auth_invalid());
        }

        let event = AuthEvent::now(AuthEventKind::TokenRefreshed)
            .with_principal_kind(record.principal_kind)
            .with_origin(origin)
            .with_detail(serde_json::json!({
                "lineage_id": record.lineage_id,
                "rotated": record.id,
                "issued": successor.record.id,
            }));
        let event = match record.tenant_id {
            Some(t) => event.with_tenant(t),
            None => event,
        };
        if let Err(e) = database.record_auth_event(&event).await {
            tracing::warn!("Failed to record refresh event: {e}");
        }

        Ok((successor, record))
    }

    /// Fetch a token's record after proving possession, ignoring its state.
    ///
    /// Read-only and liveness-agnostic. Callers use this to run cross-checks
    /// on a token before `rotate` reacts to its state; a dead token still
    /// comes back here so that rotation can treat its presentation as reuse.
    ///
    /// # Errors
    /// Returns a generic authentication error for an unknown id or a secret
    /// mismatch
    pub async fn inspect(
        &self,
        database: &Database,
        raw: &RawRefreshToken,
    ) -> AppResult<RefreshTokenRecord> {
        let record = database
            .get_refresh_token(raw.id)
            .await?
            .ok_or_else(AppError::auth_invalid)?;

        if !verify_token_secret(&raw.secret, &record.secret_hash) {
            return Err(AppError::auth_invalid());
        }
        Ok(record)
    }

    /// Validate a presented token read-only, without rotating it
    ///
    /// # Errors
    /// Returns a generic authentication error for any non-live token
    pub async fn validate(
        &self,
        database: &Database,
        raw: &RawRefreshToken,
    ) -> AppResult<RefreshTokenRecord> {
        let record = self.inspect(database, raw).await?;
        if !record.is_live(Utc::now()) {
            return Err(AppError::auth_invalid());
        }
        Ok(record)
    }

    /// Revoke a presented token at logout. Succeeds quietly even when the
    /// token is already dead; logout is idempotent.
    ///
    /// # Errors
    /// Returns a generic authentication error when possession is not proven
    pub async fn revoke(
        &self,
        database: &Database,
        raw: &RawRefreshToken,
        origin: &RequestOrigin,
    ) -> AppResult<()> {
        let Some(record) = database.get_refresh_token(raw.id).await? else {
            return Err(AppError::auth_invalid());
        };
        if !verify_token_secret(&raw.secret, &record.secret_hash) {
            return Err(AppError::auth_invalid());
        }

        database.revoke_refresh_token(record.id, Utc::now()).await?;

        let event = AuthEvent::now(AuthEventKind::Logout)
            .with_principal_kind(record.principal_kind)
            .with_origin(origin)
            .with_detail(serde_json::json!({ "lineage_id": record.lineage_id }));
        if let Err(e) = database.record_auth_event(&event).await {
            tracing::warn!("Failed to record logout event: {e}");
        }
        Ok(())
    }

    fn build_token(
        &self,
        principal_kind: PrincipalKind,
        principal_id: Uuid,
        lineage_id: Uuid,
        tenant_id: Option<Uuid>,
        origin: &RequestOrigin,
    ) -> AppResult<IssuedRefreshToken> {
        let secret = generate_token_secret()?;
        let now = Utc::now();
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            principal_kind,
            principal_id,
            lineage_id,
            secret_hash: hash_token_secret(&secret),
            tenant_id,
            expires_at: now + Duration::days(self.ttl_days),
            revoked_at: None,
            replaced_by_id: None,
            created_at: now,
            created_from_ip: origin.ip.clone(),
            client_info: origin.user_agent.clone(),
        };
        Ok(IssuedRefreshToken {
            token: RawRefreshToken::compose(record.id, &secret),
            record,
        })
    }

    /// Revoke every live token in the lineage and log the reuse. Best
    /// effort: the caller is returning a 401 either way.
    async fn burn_lineage(
        &self,
        database: &Database,
        record: &RefreshTokenRecord,
        origin: &RequestOrigin,
    ) {
        match database
            .revoke_refresh_lineage(record.lineage_id, Utc::now())
            .await
        {
            Ok(revoked) => {
                tracing::warn!(
                    lineage = %record.lineage_id,
                    revoked,
                    "Refresh token reuse detected, lineage revoked"
                );
            }
            Err(e) => {
                tracing::error!(lineage = %record.lineage_id, "Failed to revoke lineage: {e}");
            }
        }

        let event = AuthEvent::now(AuthEventKind::ReuseDetected)
            .with_principal_kind(record.principal_kind)
            .with_origin(origin)
            .with_detail(serde_json::json!({
                "lineage_id": record.lineage_id,
                "presented": record.id,
            }));
        let event = match record.tenant_id {
            Some(t) => event.with_tenant(t),
            None => event,
        };
        if let Err(e) = database.record_auth_event(&event).await {
            tracing::warn!("Failed to record reuse event: {e}");
        }
    }
}
