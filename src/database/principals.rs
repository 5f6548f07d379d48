// ABOUTME: Tenant-user and platform-operator database operations
// ABOUTME: Lookups, creation, memberships, and last-login bookkeeping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use super::{fmt_ts, parse_ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{OperatorRole, PlatformOperator, TenantUser};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create a tenant user
    ///
    /// # Errors
    /// Returns an error if insertion fails
    pub async fn create_tenant_user(&self, user: &TenantUser) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO tenant_users (
                id, email, password_hash, display_name, default_tenant_id,
                is_active, created_at, last_login_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(user.default_tenant_id.to_string())
        .bind(user.is_active)
        .bind(fmt_ts(user.created_at))
        .bind(user.last_login_at.map(fmt_ts))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create tenant user: {e}")))?;

        Ok(())
    }

    /// Create a platform operator
    ///
    /// # Errors
    /// Returns an error if insertion fails
    pub async fn create_operator(&self, operator: &PlatformOperator) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO platform_operators (
                id, email, password_hash, display_name, role,
                is_active, created_at, last_login_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(operator.id.to_string())
        .bind(&operator.email)
        .bind(&operator.password_hash)
        .bind(&operator.display_name)
        .bind(operator.role.as_str())
        .bind(operator.is_active)
        .bind(fmt_ts(operator.created_at))
        .bind(operator.last_login_at.map(fmt_ts))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create operator: {e}")))?;

        Ok(())
    }

    /// Grant a user membership of a tenant
    ///
    /// # Errors
    /// Returns an error if insertion fails
    pub async fn add_tenant_membership(&self, user_id: Uuid, tenant_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO tenant_memberships (user_id, tenant_id, created_at)
             VALUES (?, ?, ?)",
        )
        .bind(user_id.to_string())
        .bind(tenant_id.to_string())
        .bind(fmt_ts(Utc::now()))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to add tenant membership: {e}")))?;

        Ok(())
    }

    /// Get a tenant user by ID
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn get_tenant_user_by_id(&self, user_id: Uuid) -> AppResult<Option<TenantUser>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, display_name, default_tenant_id,
                    is_active, created_at, last_login_at
             FROM tenant_users WHERE id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get tenant user: {e}")))?;

        row.map(|r| Self::row_to_tenant_user(&r)).transpose()
    }

    /// Get a platform operator by email
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn get_operator_by_email(&self, email: &str) -> AppResult<Option<PlatformOperator>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, display_name, role,
                    is_active, created_at, last_login_at
             FROM platform_operators WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get operator: {e}")))?;

        row.map(|r| Self::row_to_operator(&r)).transpose()
    }

    /// Get a platform operator by ID
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn get_operator_by_id(&self, operator_id: Uuid) -> AppResult<Option<PlatformOperator>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, display_name, role,
                    is_active, created_at, last_login_at
             FROM platform_operators WHERE id = ?",
        )
        .bind(operator_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get operator: {e}")))?;

        row.map(|r| Self::row_to_operator(&r)).transpose()
    }

    /// Whether a user belongs to a tenant
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn user_belongs_to_tenant(&self, user_id: Uuid, tenant_id: Uuid) -> AppResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM tenant_memberships WHERE user_id = ? AND tenant_id = ?",
        )
        .bind(user_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to check membership: {e}")))?;

        Ok(row.is_some())
    }

    /// Stamp a tenant user's last successful login
    ///
    /// # Errors
    /// Returns an error if the database update fails
    pub async fn update_tenant_user_last_login(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE tenant_users SET last_login_at = ? WHERE id = ?")
            .bind(fmt_ts(Utc::now()))
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to update last login: {e}")))?;

        Ok(())
    }

    /// Stamp an operator's last successful login
    ///
    /// # Errors
    /// Returns an error if the database update fails
    pub async fn update_operator_last_login(&self, operator_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE platform_operators SET last_login_at = ? WHERE id = ?")
            .bind(fmt_ts(Utc::now()))
            .bind(operator_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to update last login: {e}")))?;

        Ok(())
    }

    /// Convert database row to `TenantUser`
    pub(crate) fn row_to_tenant_user(row: &SqliteRow) -> AppResult<TenantUser> {
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
                .map(|s| parse_ts(&s))
                .transpose()
                .map_err(|e| AppError::database(format!("Invalid last_login_at timestamp: {e}")))?,
        })
    }

    /// Convert database row to `PlatformOperator`
    fn row_to_operator(row: &SqliteRow) -> AppResult<PlatformOperator> {
        let id: String = row.get("id");
        let role: String = row.get("role");
        let created_at: String = row.get("created_at");
        let last_login_at: Option<String> = row.get("last_login_at");

        Ok(PlatformOperator {
            id: Uuid::parse_str(&id)
                .map_err(|e| AppError::database(format!("Invalid operator id UUID: {e}")))?,
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            display_name: row.get("display_name"),
            role: OperatorRole::from_db_string(&role),
            is_active: row.get("is_active"),
            created_at: parse_ts(&created_at)
                .map_err(|e| AppError::database(format!("Invalid created_at timestamp: {e}")))?,
            last_login_at: last_login_at
                .map(|s| parse_ts(&s))
                .transpose()
                .map_err(|e| AppError::database(format!("Invalid last_login_at timestamp: {e}")))?,
        })
    }
}
