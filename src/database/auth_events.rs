// ABOUTME: Authentication event log used for forensics and the throttle counters
// ABOUTME: Also holds the operator audit trail for bridge issue and redeem actions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use super::{fmt_ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::AuthEvent;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Append an authentication event
    ///
    /// # Errors
    /// Returns an error if insertion fails
    pub async fn record_auth_event(&self, event: &AuthEvent) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO auth_events (
                kind, principal_kind, identifier, tenant_id, origin_ip, detail, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(event.kind.as_str())
        .bind(event.principal_kind.map(|k| k.as_str()))
        .bind(&event.identifier)
        .bind(event.tenant_id.map(|t| t.to_string()))
        .bind(&event.origin_ip)
        .bind(event.detail.to_string())
        .bind(fmt_ts(event.created_at))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to record auth event: {e}")))?;

        Ok(())
    }

    /// Count login attempts (success or failure) from one origin address
    /// since the given instant
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn count_attempts_from_origin(
        &self,
        origin_ip: &str,
        since: DateTime<Utc>,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as n FROM auth_events
             WHERE origin_ip = ?
               AND kind IN ('login_success', 'login_failure')
               AND created_at >= ?",
        )
        .bind(origin_ip)
        .bind(fmt_ts(since))
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to count origin attempts: {e}")))?;

        Ok(row.get("n"))
    }

    /// Count failed logins from one origin address since the given instant
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn count_failures_from_origin(
        &self,
        origin_ip: &str,
        since: DateTime<Utc>,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as n FROM auth_events
             WHERE origin_ip = ? AND kind = 'login_failure' AND created_at >= ?",
        )
        .bind(origin_ip)
        .bind(fmt_ts(since))
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to count origin failures: {e}")))?;

        Ok(row.get("n"))
    }

    /// Count failed logins against one identifier within a tenant scope
    /// since the given instant. A null tenant matches the platform scope.
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn count_failures_for_identifier(
        &self,
        identifier: &str,
        tenant_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as n FROM auth_events
             WHERE identifier = ?
               AND kind = 'login_failure'
               AND (tenant_id = ? OR (tenant_id IS NULL AND ? IS NULL))
               AND created_at >= ?",
        )
        .bind(identifier)
        .bind(tenant_id.map(|t| t.to_string()))
        .bind(tenant_id.map(|t| t.to_string()))
        .bind(fmt_ts(since))
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to count identifier failures: {e}")))?;

        Ok(row.get("n"))
    }

    /// Append an operator audit record
    ///
    /// # Errors
    /// Returns an error if insertion fails
    pub async fn record_audit_event(
        &self,
        actor_id: Uuid,
        action: &str,
        tenant_id: Option<Uuid>,
        detail: Option<&serde_json::Value>,
        origin_ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO audit_events (actor_id, action, tenant_id, detail, origin_ip, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(actor_id.to_string())
        .bind(action)
        .bind(tenant_id.map(|t| t.to_string()))
        .bind(detail.map(std::string::ToString::to_string))
        .bind(origin_ip)
        .bind(fmt_ts(now))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to record audit event: {e}")))?;

        Ok(())
    }
}
