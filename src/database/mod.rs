// ABOUTME: Database management with SQLite pool setup and schema migrations
// ABOUTME: Entity-family operations live in submodules as impl blocks on Database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

//! # Database Management
//!
//! Connection pool and schema for the authentication subsystem. Data access
//! is grouped per entity family in sibling modules; everything is a plain
//! `sqlx::query` with explicit binds.
//!
//! Timestamps are stored as fixed-precision RFC 3339 UTC text so that SQL
//! string comparison orders them chronologically.

mod auth_events;
mod bridge_tokens;
mod principals;
mod refresh_tokens;
mod tenants;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Format a timestamp for storage. Fixed microsecond precision keeps
/// lexicographic and chronological order identical.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Database manager for principals, tokens, and event logs
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection and run migrations
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established or a
    /// migration statement fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    /// Returns an error if any schema statement fails
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_tenants().await?;
        self.migrate_principals().await?;
        self.migrate_tokens().await?;
        self.migrate_events().await?;
        Ok(())
    }

    async fn migrate_tenants(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                subdomain TEXT UNIQUE,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn migrate_principals(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tenant_users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                display_name TEXT,
                default_tenant_id TEXT NOT NULL REFERENCES tenants(id),
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                last_login_at TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tenant_memberships (
                user_id TEXT NOT NULL REFERENCES tenant_users(id),
                tenant_id TEXT NOT NULL REFERENCES tenants(id),
                created_at TEXT NOT NULL,
                PRIMARY KEY (user_id, tenant_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS platform_operators (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                display_name TEXT,
                role TEXT NOT NULL DEFAULT 'auditor',
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                last_login_at TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn migrate_tokens(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                id TEXT PRIMARY KEY,
                principal_kind TEXT NOT NULL,
                principal_id TEXT NOT NULL,
                lineage_id TEXT NOT NULL,
                secret_hash TEXT NOT NULL,
                tenant_id TEXT,
                expires_at TEXT NOT NULL,
                revoked_at TEXT,
                replaced_by_id TEXT,
                created_at TEXT NOT NULL,
                created_from_ip TEXT,
                client_info TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_lineage
             ON refresh_tokens(lineage_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS bridge_tokens (
                id TEXT PRIMARY KEY,
                operator_id TEXT NOT NULL REFERENCES platform_operators(id),
                tenant_id TEXT NOT NULL REFERENCES tenants(id),
                secret_hash TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                consumed_at TEXT,
                created_at TEXT NOT NULL,
                issued_from_ip TEXT,
                consumed_from_ip TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn migrate_events(&self) -> Result<()> {
        // identifier and tenant_id are dedicated indexed columns; the rate
        // limiter never parses the detail payload
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS auth_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                principal_kind TEXT,
                identifier TEXT,
                tenant_id TEXT,
                origin_ip TEXT,
                detail TEXT NOT NULL DEFAULT 'null',
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_auth_events_origin
             ON auth_events(origin_ip, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_auth_events_identifier
             ON auth_events(identifier, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS audit_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                actor_id TEXT NOT NULL,
                action TEXT NOT NULL,
                tenant_id TEXT,
                detail TEXT,
                origin_ip TEXT,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
