// ABOUTME: HTTP route handler organization
// ABOUTME: Authentication, operator console, and health endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

/// Login, refresh, logout, and tenant portal entry
pub mod auth;
/// Liveness endpoint
pub mod health;
/// Operator console endpoints on the platform host
pub mod operator;

pub use auth::{
    AuthService, LoginRequest, LoginResponse, LogoutRequest, LogoutResponse, PortalLoginRequest,
    PortalLoginResponse, RefreshRequest, RefreshResponse,
};
pub use health::HealthResponse;
pub use operator::{OpenTenantRequest, OpenTenantResponse};
