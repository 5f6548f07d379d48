// ABOUTME: Health check endpoint reporting service liveness and database reachability
// ABOUTME: Reachable on any host, requires no authentication
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::server::ServerResources;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

/// Health status response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// GET /health
pub async fn health_handler(State(resources): State<Arc<ServerResources>>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1")
        .execute(resources.database.pool())
        .await
    {
        Ok(_) => "ok",
        Err(e) => {
            tracing::error!("Health check database probe failed: {e}");
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: if database == "ok" { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}
