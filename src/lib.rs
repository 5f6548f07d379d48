// ABOUTME: Main library entry point for the Limsgate authentication platform
// ABOUTME: Tenant-scoped login, refresh-token rotation, and operator impersonation

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

#![deny(unsafe_code)]

//! # Limsgate
//!
//! Authentication and session-lifecycle service for a multi-tenant
//! laboratory information platform. Each tenant is an isolated workspace
//! reached through its own subdomain; platform operators work from a
//! separate console host and can enter a tenant only through a short-lived,
//! one-time bridge token.
//!
//! ## Subsystems
//!
//! - **Tenant resolution**: the request Host header decides whether a
//!   request runs in a tenant workspace or the operator console
//! - **Credential login**: bcrypt-verified, uniformly throttled, with one
//!   generic failure response for every cause
//! - **Refresh tokens**: rotation chains with lineage tracking; presenting
//!   a dead token revokes its entire lineage
//! - **Impersonation bridge**: hash-stored single-use tokens binding an
//!   operator to exactly one tenant for a few seconds
//! - **Data-access gate**: tenant queries run through views that resolve
//!   the authorized tenant from connection state and fail closed
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use limsgate::config::ServerConfig;
//! use limsgate::database::Database;
//! use limsgate::errors::AppResult;
//! use limsgate::server::{run_server, ServerResources};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     let database = Database::new(&config.database_url).await?;
//!     database.migrate().await?;
//!     run_server(Arc::new(ServerResources::new(database, config))).await
//! }
//! ```

/// Access-token minting and validation
pub mod auth;

/// One-time operator-to-tenant bridge tokens
pub mod bridge;

/// Environment-driven configuration
pub mod config;

/// Token secret generation, hashing, and constant-time comparison
pub mod crypto;

/// `SQLite` persistence for principals, tokens, and event logs
pub mod database;

/// Error types and `HTTP` response mapping
pub mod errors;

/// Structured logging initialization
pub mod logging;

/// Scope-resolution and authentication middleware
pub mod middleware;

/// Domain types shared across the crate
pub mod models;

/// Sliding-window login throttle
pub mod rate_limiting;

/// Refresh-token rotation lifecycle
pub mod refresh_tokens;

/// `HTTP` route handlers
pub mod routes;

/// Router assembly and the serve loop
pub mod server;

/// Host-to-scope resolution and the tenant data-access gate
pub mod tenant;
