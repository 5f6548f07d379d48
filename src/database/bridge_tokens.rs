// ABOUTME: Bridge-token persistence for the operator-to-tenant sign-in handoff
// ABOUTME: Consumption is a conditional update so each token redeems at most once
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use super::{fmt_ts, parse_ts, Database};
use crate::errors::{AppError, AppResult};
use crate::models::BridgeTokenRecord;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Insert a newly issued bridge token
    ///
    /// # Errors
    /// Returns an error if insertion fails
    pub async fn insert_bridge_token(&self, record: &BridgeTokenRecord) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO bridge_tokens (
                id, operator_id, tenant_id, secret_hash, expires_at,
                consumed_at, created_at, issued_from_ip, consumed_from_ip
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(record.id.to_string())
        .bind(record.operator_id.to_string())
        .bind(record.tenant_id.to_string())
        .bind(&record.secret_hash)
        .bind(fmt_ts(record.expires_at))
        .bind(record.consumed_at.map(fmt_ts))
        .bind(fmt_ts(record.created_at))
        .bind(&record.issued_from_ip)
        .bind(&record.consumed_from_ip)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to insert bridge token: {e}")))?;

        Ok(())
    }

    /// Fetch a bridge token by ID
    ///
    /// # Errors
    /// Returns an error if the database query fails
    pub async fn get_bridge_token(&self, id: Uuid) -> AppResult<Option<BridgeTokenRecord>> {
        let row = sqlx::query(
            "SELECT id, operator_id, tenant_id, secret_hash, expires_at,
                    consumed_at, created_at, issued_from_ip, consumed_from_ip
             FROM bridge_tokens WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get bridge token: {e}")))?;

        row.map(|r| Self::row_to_bridge_token(&r)).transpose()
    }

    /// Consume a bridge token if it is still live and unspent.
    ///
    /// The update only matches unconsumed, unexpired rows, so of any number
    /// of concurrent redemptions exactly one sees `rows_affected == 1`.
    ///
    /// # Errors
    /// Returns an error if the database update fails
    pub async fn consume_bridge_token(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        origin_ip: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE bridge_tokens SET consumed_at = ?, consumed_from_ip = ?
             WHERE id = ? AND consumed_at IS NULL AND expires_at > ?",
        )
        .bind(fmt_ts(now))
        .bind(origin_ip)
        .bind(id.to_string())
        .bind(fmt_ts(now))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to consume bridge token: {e}")))?;

        Ok(result.rows_affected() == 1)
    }

    /// Convert database row to `BridgeTokenRecord`
    fn row_to_bridge_token(row: &SqliteRow) -> AppResult<BridgeTokenRecord> {
        let id: String = row.get("id");
        let operator_id: String = row.get("operator_id");
        let tenant_id: String = row.get("tenant_id");
        let expires_at: String = row.get("expires_at");
        let consumed_at: Option<String> = row.get("consumed_at");
        let created_at: String = row.get("created_at");

        Ok(BridgeTokenRecord {
            id: Uuid::parse_str(&id)
                .map_err(|e| AppError::database(format!("Invalid bridge token id UUID: {e}")))?,
            operator_id: Uuid::parse_str(&operator_id)
                .map_err(|e| AppError::database(format!("Invalid operator id UUID: {e}")))?,
            tenant_id: Uuid::parse_str(&tenant_id)
                .map_err(|e| AppError::database(format!("Invalid tenant id UUID: {e}")))?,
            secret_hash: row.get("secret_hash"),
            expires_at: parse_ts(&expires_at)
                .map_err(|e| AppError::database(format!("Invalid expires_at timestamp: {e}")))?,
            consumed_at: consumed_at
                .map(|s| parse_ts(&s))
                .transpose()
                .map_err(|e| AppError::database(format!("Invalid consumed_at timestamp: {e}")))?,
            created_at: parse_ts(&created_at)
                .map_err(|e| AppError::database(format!("Invalid created_at timestamp: {e}")))?,
            issued_from_ip: row.get("issued_from_ip"),
            consumed_from_ip: row.get("consumed_from_ip"),
        })
    }
}
