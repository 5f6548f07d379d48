// ABOUTME: Configuration module organization
// ABOUTME: Environment-variable driven server configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

/// Environment-variable backed server configuration
pub mod environment;

pub use environment::{
    BridgeConfig, Environment, RateLimitConfig, ServerConfig, SigningKeys,
    BRIDGE_TTL_CEILING_SECS, DEFAULT_BRIDGE_TTL_SECS,
};
