// ABOUTME: HTTP middleware organization
// ABOUTME: Host-scope resolution and bearer-token authentication layers

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

pub mod auth;
pub mod tenant;

pub use auth::{authenticate_request, require_platform_operator, require_scope_match};
pub use tenant::{
    require_platform_scope, require_tenant_scope, scope_middleware, ResolvedScope,
};
