// ABOUTME: Host-based tenant scope resolution and the tenant data-access gate
// ABOUTME: A TenantSession pins a connection whose queries can only see one tenant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::database::{parse_ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{Tenant, TenantUser};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use uuid::Uuid;

/// The scope a request resolved to from its Host header
#[derive(Debug, Clone)]
pub enum TenantScope {
    /// The operator console host
    Platform,
    /// An active tenant workspace
    Tenant(Tenant),
}

impl TenantScope {
    /// Tenant id when scoped to a tenant
    #[must_use]
    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            Self::Platform => None,
            Self::Tenant(t) => Some(t.id),
        }
    }
}

/// Resolve a request host to a scope.
///
/// The port is ignored. The platform host resolves to the platform scope; a
/// first-label subdomain of the tenant base domain resolves to that tenant
/// if it exists and is active. Everything else, including inactive tenants
/// and unknown subdomains, resolves to nothing. Callers must treat `None`
/// as a request that has no business here.
///
/// # Errors
/// Returns an error only on database failure; unresolvable hosts are `Ok(None)`
pub async fn resolve_scope(
    database: &Database,
    host: &str,
    platform_host: &str,
    tenant_base_domain: &str,
) -> AppResult<Option<TenantScope>> {
    let host = host.split(':').next().unwrap_or(host).to_ascii_lowercase();

    if host == platform_host.to_ascii_lowercase() {
        return Ok(Some(TenantScope::Platform));
    }

    let suffix = format!(".{}", tenant_base_domain.to_ascii_lowercase());
    let Some(label) = host.strip_suffix(&suffix) else {
        return Ok(None);
    };
    // Only one label deep: "acme.base" yes, "x.acme.base" no
    if label.is_empty() || label.contains('.') {
        return Ok(None);
    }

    match database.get_tenant_by_subdomain(label).await? {
        Some(tenant) if tenant.is_active => Ok(Some(TenantScope::Tenant(tenant))),
        _ => Ok(None),
    }
}

/// A database session whose visibility is pinned to one tenant.
///
/// Holds a dedicated pool connection and the tenant id fixed at open time.
/// Every query the session runs joins through `tenant_memberships` with
/// that id bound as a parameter, so no identifier a caller supplies can
/// reach another tenant's rows. There is no ambient scope to forget to
/// set; a query without the binding simply does not exist on this type.
pub struct TenantSession {
    conn: PoolConnection<Sqlite>,
    tenant_id: Uuid,
}

impl TenantSession {
    /// Open a session scoped to a tenant
    ///
    /// # Errors
    /// Returns an error if a connection cannot be acquired
    pub async fn open(database: &Database, tenant_id: Uuid) -> AppResult<Self> {
        let conn = database
            .pool()
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;

        Ok(Self { conn, tenant_id })
    }

    /// Tenant this session is pinned to
    #[must_use]
    pub const fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Look up a member of this tenant by email. Users outside the tenant
    /// are invisible, not distinguishable from nonexistent.
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn find_user_by_email(&mut self, email: &str) -> AppResult<Option<TenantUser>> {
        let row = sqlx::query(
            "SELECT u.id, u.email, u.password_hash, u.display_name,
                    u.default_tenant_id, u.is_active, u.created_at, u.last_login_at
             FROM tenant_users u
             JOIN tenant_memberships m ON m.user_id = u.id
             WHERE m.tenant_id = ? AND u.email = ?",
        )
        .bind(self.tenant_id.to_string())
        .bind(email)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| AppError::database(format!("Scoped user lookup failed: {e}")))?;

        row.map(|r| row_to_scoped_user(&r)).transpose()
    }

    /// List the members of this tenant
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn list_users(&mut self) -> AppResult<Vec<TenantUser>> {
        let rows = sqlx::query(
            "SELECT u.id, u.email, u.password_hash, u.display_name,
                    u.default_tenant_id, u.is_active, u.created_at, u.last_login_at
             FROM tenant_users u
             JOIN tenant_memberships m ON m.user_id = u.id
             WHERE m.tenant_id = ?
             ORDER BY u.email",
        )
        .bind(self.tenant_id.to_string())
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| AppError::database(format!("Scoped user listing failed: {e}")))?;

        rows.iter().map(row_to_scoped_user).collect()
    }
}

fn row_to_scoped_user(row: &SqliteRow) -> AppResult<TenantUser> {
    let id: String = row.get("id");
    let default_tenant_id: String = row.get("default_tenant_id");
    let created_at: String = row.get("created_at");
    let last_login_at: Option<String> = row.get("last_login_at");

    Ok(TenantUser {
        id: Uuid::parse_str(&id)
            .map_err(|e| AppError::database(format!("Invalid user id UUID: {e}")))?,
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        display_name: row.get("display_name"),
        default_tenant_id: Uuid::parse_str(&default_tenant_id)
            .map_err(|e| AppError::database(format!("Invalid tenant id UUID: {e}")))?,
        is_active: row.get("is_active"),
        created_at: parse_ts(&created_at)
            .map_err(|e| AppError::database(format!("Invalid created_at timestamp: {e}")))?,
        last_login_at: last_login_at
            .as_deref()
            .map(parse_ts)
            .transpose()
            .map_err(|e| AppError::database(format!("Invalid last_login_at timestamp: {e}")))?,
    })
}
