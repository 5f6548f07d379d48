// ABOUTME: Refresh-token persistence: insert, conditional rotate-mark, lineage revocation
// ABOUTME: The conditional update is the single-winner arbiter for concurrent rotations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use super::{fmt_ts, parse_ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{PrincipalKind, RefreshTokenRecord};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Insert a newly issued refresh token
    ///
    /// # Errors
    /// Returns an error if insertion fails
    pub async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO refresh_tokens (
                id, principal_kind, principal_id, lineage_id, secret_hash,
                tenant_id, expires_at, revoked_at, replaced_by_id,
                created_at, created_from_ip, client_info
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(record.id.to_string())
        .bind(record.principal_kind.as_str())
        .bind(record.principal_id.to_string())
        .bind(record.lineage_id.to_string())
        .bind(&record.secret_hash)
        .bind(record.tenant_id.map(|t| t.to_string()))
        .bind(fmt_ts(record.expires_at))
        .bind(record.revoked_at.map(fmt_ts))
        .bind(record.replaced_by_id.map(|r| r.to_string()))
        .bind(fmt_ts(record.created_at))
        .bind(&record.created_from_ip)
        .bind(&record.client_info)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to insert refresh token: {e}")))?;

        Ok(())
    }

    /// Fetch a refresh token by ID
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn get_refresh_token(&self, id: Uuid) -> AppResult<Option<RefreshTokenRecord>> {
        let row = sqlx::query(
            "SELECT id, principal_kind, principal_id, lineage_id, secret_hash,
                    tenant_id, expires_at, revoked_at, replaced_by_id,
                    created_at, created_from_ip, client_info
             FROM refresh_tokens WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get refresh token: {e}")))?;

        row.map(|r| Self::row_to_refresh_token(&r)).transpose()
    }

    /// Rotate a refresh token: mark the old link rotated and insert its
    /// successor inside one transaction.
    ///
    /// The rotate-mark only matches a still-live, never-rotated row, so of
    /// any number of concurrent rotations of the same token exactly one can
    /// observe `rows_affected == 1`. Returns false when this call lost that
    /// race (or the token died in the meantime); nothing is written in that
    /// case.
    ///
    /// # Errors
    /// Returns an error if the transaction fails
    pub async fn rotate_refresh_token(
        &self,
        old_id: Uuid,
        successor: &RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin rotation: {e}")))?;

        let marked = sqlx::query(
            "UPDATE refresh_tokens
             SET revoked_at = ?, replaced_by_id = ?
             WHERE id = ? AND revoked_at IS NULL AND replaced_by_id IS NULL",
        )
        .bind(fmt_ts(now))
        .bind(successor.id.to_string())
        .bind(old_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to mark token rotated: {e}")))?;

        if marked.rows_affected() != 1 {
            tx.rollback()
                .await
                .map_err(|e| AppError::database(format!("Failed to roll back rotation: {e}")))?;
            return Ok(false);
        }

        sqlx::query(
            r"
            INSERT INTO refresh_tokens (
                id, principal_kind, principal_id, lineage_id, secret_hash,
                tenant_id, expires_at, revoked_at, replaced_by_id,
                created_at, created_from_ip, client_info
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(successor.id.to_string())
        .bind(successor.principal_kind.as_str())
        .bind(successor.principal_id.to_string())
        .bind(successor.lineage_id.to_string())
        .bind(&successor.secret_hash)
        .bind(successor.tenant_id.map(|t| t.to_string()))
        .bind(fmt_ts(successor.expires_at))
        .bind(successor.revoked_at.map(fmt_ts))
        .bind(successor.replaced_by_id.map(|r| r.to_string()))
        .bind(fmt_ts(successor.created_at))
        .bind(&successor.created_from_ip)
        .bind(&successor.client_info)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to insert rotated token: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit rotation: {e}")))?;

        Ok(true)
    }

    /// Revoke a single refresh token if still live
    ///
    /// # Errors
    /// Returns an error if the database update fails
    pub async fn revoke_refresh_token(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ?
             WHERE id = ? AND revoked_at IS NULL",
        )
        .bind(fmt_ts(now))
        .bind(id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to revoke refresh token: {e}")))?;

        Ok(result.rows_affected() == 1)
    }

    /// Revoke every live token in a lineage. Idempotent: already-revoked
    /// rows are untouched.
    ///
    /// # Errors
    /// Returns an error if the database update fails
    pub async fn revoke_refresh_lineage(
        &self,
        lineage_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ?
             WHERE lineage_id = ? AND revoked_at IS NULL",
        )
        .bind(fmt_ts(now))
        .bind(lineage_id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to revoke lineage: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Fetch every token in a lineage, oldest first
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn get_refresh_lineage(
        &self,
        lineage_id: Uuid,
    ) -> AppResult<Vec<RefreshTokenRecord>> {
        let rows = sqlx::query(
            "SELECT id, principal_kind, principal_id, lineage_id, secret_hash,
                    tenant_id, expires_at, revoked_at, replaced_by_id,
                    created_at, created_from_ip, client_info
             FROM refresh_tokens WHERE lineage_id = ?
             ORDER BY created_at ASC",
        )
        .bind(lineage_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list lineage: {e}")))?;

        rows.iter().map(Self::row_to_refresh_token).collect()
    }

    /// Convert database row to `RefreshTokenRecord`
    fn row_to_refresh_token(row: &SqliteRow) -> AppResult<RefreshTokenRecord> {
        let id: String = row.get("id");
        let principal_kind: String = row.get("principal_kind");
        let principal_id: String = row.get("principal_id");
        let lineage_id: String = row.get("lineage_id");
        let tenant_id: Option<String> = row.get("tenant_id");
        let expires_at: String = row.get("expires_at");
        let revoked_at: Option<String> = row.get("revoked_at");
        let replaced_by_id: Option<String> = row.get("replaced_by_id");
        let created_at: String = row.get("created_at");

        Ok(RefreshTokenRecord {
            id: Uuid::parse_str(&id)
                .map_err(|e| AppError::database(format!("Invalid token id UUID: {e}")))?,
            principal_kind: PrincipalKind::from_db_string(&principal_kind).ok_or_else(|| {
                AppError::database(format!("Unknown principal kind: {principal_kind}"))
            })?,
            principal_id: Uuid::parse_str(&principal_id)
                .map_err(|e| AppError::database(format!("Invalid principal id UUID: {e}")))?,
            lineage_id: Uuid::parse_str(&lineage_id)
                .map_err(|e| AppError::database(format!("Invalid lineage id UUID: {e}")))?,
            secret_hash: row.get("secret_hash"),
            tenant_id: tenant_id
                .map(|t| Uuid::parse_str(&t))
                .transpose()
                .map_err(|e| AppError::database(format!("Invalid tenant id UUID: {e}")))?,
            expires_at: parse_ts(&expires_at)
                .map_err(|e| AppError::database(format!("Invalid expires_at timestamp: {e}")))?,
            revoked_at: revoked_at
                .map(|s| parse_ts(&s))
                .transpose()
                .map_err(|e| AppError::database(format!("Invalid revoked_at timestamp: {e}")))?,
            replaced_by_id: replaced_by_id
                .map(|r| Uuid::parse_str(&r))
                .transpose()
                .map_err(|e| AppError::database(format!("Invalid replaced_by id UUID: {e}")))?,
            created_at: parse_ts(&created_at)
                .map_err(|e| AppError::database(format!("Invalid created_at timestamp: {e}")))?,
            created_from_ip: row.get("created_from_ip"),
            client_info: row.get("client_info"),
        })
    }
}
