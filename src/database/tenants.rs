// ABOUTME: Tenant lookup and creation database operations
// ABOUTME: Host resolution reads tenants by subdomain; inactive tenants resolve nowhere
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use super::{fmt_ts, parse_ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::Tenant;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create a new tenant
    ///
    /// # Errors
    /// Returns an error if insertion fails (duplicate code/subdomain included)
    pub async fn create_tenant(&self, tenant: &Tenant) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO tenants (id, code, name, subdomain, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(tenant.id.to_string())
        .bind(&tenant.code)
        .bind(&tenant.name)
        .bind(&tenant.subdomain)
        .bind(tenant.is_active)
        .bind(fmt_ts(tenant.created_at))
        .bind(fmt_ts(tenant.updated_at))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create tenant: {e}")))?;

        Ok(())
    }

    /// Get tenant by ID
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn get_tenant_by_id(&self, tenant_id: Uuid) -> AppResult<Option<Tenant>> {
        let row = sqlx::query(
            "SELECT id, code, name, subdomain, is_active, created_at, updated_at
             FROM tenants WHERE id = ?",
        )
        .bind(tenant_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get tenant: {e}")))?;

        row.map(|r| Self::row_to_tenant(&r)).transpose()
    }

    /// Get tenant by subdomain. Host resolution path; returns inactive
    /// tenants too so the caller can distinguish and fail closed.
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn get_tenant_by_subdomain(&self, subdomain: &str) -> AppResult<Option<Tenant>> {
        let row = sqlx::query(
            "SELECT id, code, name, subdomain, is_active, created_at, updated_at
             FROM tenants WHERE subdomain = ?",
        )
        .bind(subdomain)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get tenant by subdomain: {e}")))?;

        row.map(|r| Self::row_to_tenant(&r)).transpose()
    }

    /// Set a tenant's active flag
    ///
    /// # Errors
    /// Returns an error if the database update fails
    pub async fn set_tenant_active(&self, tenant_id: Uuid, is_active: bool) -> AppResult<()> {
        sqlx::query("UPDATE tenants SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(is_active)
            .bind(fmt_ts(chrono::Utc::now()))
            .bind(tenant_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to update tenant: {e}")))?;

        Ok(())
    }

    /// Convert database row to `Tenant`
    pub(crate) fn row_to_tenant(row: &SqliteRow) -> AppResult<Tenant> {
        let id: String = row.get("id");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(Tenant {
            id: Uuid::parse_str(&id)
                .map_err(|e| AppError::database(format!("Invalid tenant id UUID: {e}")))?,
            code: row.get("code"),
            name: row.get("name"),
            subdomain: row.get("subdomain"),
            is_active: row.get("is_active"),
            created_at: parse_ts(&created_at)
                .map_err(|e| AppError::database(format!("Invalid created_at timestamp: {e}")))?,
            updated_at: parse_ts(&updated_at)
                .map_err(|e| AppError::database(format!("Invalid updated_at timestamp: {e}")))?,
        })
    }
}
