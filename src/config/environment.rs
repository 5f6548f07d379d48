// ABOUTME: Environment-variable driven configuration for ports, hosts, TTLs, and secrets
// ABOUTME: Signing keys are built once at startup and injected, never a module-level global
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

//! # Server Configuration
//!
//! All configuration is environment-style. The signing secret is required
//! in production; outside production a random per-process fallback is
//! generated with a loud warning so development never runs silently on a
//! known key.

use crate::errors::{AppError, AppResult};
use anyhow::{Context, Result};
use ring::rand::{SecureRandom, SystemRandom};
use std::env;
use tracing::{info, warn};

/// Hard ceiling on bridge-token lifetime, seconds. Config may shorten but
/// never extend past this.
pub const BRIDGE_TTL_CEILING_SECS: i64 = 300;

/// Default bridge-token lifetime, seconds
pub const DEFAULT_BRIDGE_TTL_SECS: i64 = 90;

/// Default access-token lifetime, seconds
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 900;

/// Default refresh-token lifetime, days
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local development; insecure fallbacks permitted with warnings
    Development,
    /// Production; missing secrets are fatal at startup
    Production,
}

impl Environment {
    /// Parse an environment name, defaulting to development
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

/// Rate-limit windows and ceilings for the three login gates
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Rolling window for the per-origin volume gate, seconds
    pub window_secs: i64,
    /// Attempts (success + failure) allowed per origin within the window
    pub max_attempts_per_origin: i64,
    /// Rolling window for the failure gates, seconds. Typically longer.
    pub failure_window_secs: i64,
    /// Failures allowed per origin within the failure window
    pub max_failures_per_origin: i64,
    /// Failures allowed against one identifier within the failure window
    pub max_failures_per_identifier: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            max_attempts_per_origin: 20,
            failure_window_secs: 900,
            max_failures_per_origin: 10,
            max_failures_per_identifier: 5,
        }
    }
}

impl RateLimitConfig {
    /// Longest window in play; the retry hint never narrows down which gate
    /// tripped, so it always quotes this
    #[must_use]
    pub fn retry_after_secs(&self) -> i64 {
        self.window_secs.max(self.failure_window_secs)
    }
}

/// Impersonation bridge token lifetime settings
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Token lifetime, seconds; clamped to the ceiling at load time
    pub ttl_secs: i64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_BRIDGE_TTL_SECS,
        }
    }
}

/// Access-token signing key material.
///
/// Constructed exactly once during startup and injected through shared
/// state. `dev_fallback` marks a generated key so the warning can be
/// surfaced in health/status contexts too.
#[derive(Clone)]
pub struct SigningKeys {
    secret: Vec<u8>,
    /// True when the key was generated because no secret was configured
    pub dev_fallback: bool,
}

impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key bytes stay out of debug output
        f.debug_struct("SigningKeys")
            .field("dev_fallback", &self.dev_fallback)
            .finish_non_exhaustive()
    }
}

impl SigningKeys {
    /// Build from an explicit secret
    #[must_use]
    pub fn from_secret(secret: Vec<u8>) -> Self {
        Self {
            secret,
            dev_fallback: false,
        }
    }

    /// Resolve the signing secret from the environment.
    ///
    /// # Errors
    /// Returns a fatal configuration error when `AUTH_JWT_SECRET` is unset
    /// in production. Outside production a random per-process key is
    /// generated and a loud warning emitted.
    pub fn from_env(environment: Environment) -> AppResult<Self> {
        match env::var("AUTH_JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => {
                Ok(Self::from_secret(secret.into_bytes()))
            }
            _ => {
                if environment == Environment::Production {
                    return Err(AppError::config_missing(
                        "AUTH_JWT_SECRET must be set in production",
                    ));
                }
                warn!(
                    "AUTH_JWT_SECRET is not set - generating a random development \
                     signing key. Sessions will not survive a restart and other \
                     instances cannot validate these tokens. DO NOT run production \
                     like this."
                );
                let mut secret = vec![0u8; 64];
                SystemRandom::new().fill(&mut secret).map_err(|_| {
                    AppError::config("System RNG failure while generating dev signing key")
                })?;
                Ok(Self {
                    secret,
                    dev_fallback: true,
                })
            }
        }
    }

    /// Raw key bytes for the token signer
    #[must_use]
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Deployment environment
    pub environment: Environment,
    /// Host that resolves to the platform-operator scope
    pub platform_host: String,
    /// Base domain tenant subdomains hang off (e.g. `limsgate.example`)
    pub tenant_base_domain: String,
    /// Access-token lifetime, seconds
    pub access_token_ttl_secs: i64,
    /// Refresh-token lifetime, days
    pub refresh_token_ttl_days: i64,
    /// Login rate-limit gates
    pub rate_limit: RateLimitConfig,
    /// Impersonation bridge settings
    pub bridge: BridgeConfig,
    /// Access-token signing keys, built once here
    pub signing: SigningKeys,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns an error on unparseable values or, in production, on a
    /// missing signing secret.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let environment =
            Environment::from_str_or_default(&env_var_or("ENVIRONMENT", "development")?);

        let bridge_ttl: i64 = env_var_or("BRIDGE_TOKEN_TTL_SECS", &DEFAULT_BRIDGE_TTL_SECS.to_string())?
            .parse()
            .context("Invalid BRIDGE_TOKEN_TTL_SECS value")?;
        if bridge_ttl > BRIDGE_TTL_CEILING_SECS {
            warn!(
                "BRIDGE_TOKEN_TTL_SECS {} exceeds the {}s ceiling, clamping",
                bridge_ttl, BRIDGE_TTL_CEILING_SECS
            );
        }

        let config = Self {
            http_port: env_var_or("HTTP_PORT", "8081")?
                .parse()
                .context("Invalid HTTP_PORT value")?,
            database_url: env_var_or("DATABASE_URL", "sqlite:data/limsgate.db")?,
            environment,
            platform_host: env_var_or("PLATFORM_HOST", "ops.limsgate.local")?,
            tenant_base_domain: env_var_or("TENANT_BASE_DOMAIN", "limsgate.local")?,
            access_token_ttl_secs: env_var_or(
                "ACCESS_TOKEN_TTL_SECS",
                &DEFAULT_ACCESS_TOKEN_TTL_SECS.to_string(),
            )?
            .parse()
            .context("Invalid ACCESS_TOKEN_TTL_SECS value")?,
            refresh_token_ttl_days: env_var_or(
                "REFRESH_TOKEN_TTL_DAYS",
                &DEFAULT_REFRESH_TOKEN_TTL_DAYS.to_string(),
            )?
            .parse()
            .context("Invalid REFRESH_TOKEN_TTL_DAYS value")?,
            rate_limit: RateLimitConfig {
                window_secs: env_var_or("RATE_LIMIT_WINDOW_SECS", "300")?
                    .parse()
                    .context("Invalid RATE_LIMIT_WINDOW_SECS value")?,
                max_attempts_per_origin: env_var_or("RATE_LIMIT_MAX_ATTEMPTS_PER_ORIGIN", "20")?
                    .parse()
                    .context("Invalid RATE_LIMIT_MAX_ATTEMPTS_PER_ORIGIN value")?,
                failure_window_secs: env_var_or("RATE_LIMIT_FAILURE_WINDOW_SECS", "900")?
                    .parse()
                    .context("Invalid RATE_LIMIT_FAILURE_WINDOW_SECS value")?,
                max_failures_per_origin: env_var_or("RATE_LIMIT_MAX_FAILURES_PER_ORIGIN", "10")?
                    .parse()
                    .context("Invalid RATE_LIMIT_MAX_FAILURES_PER_ORIGIN value")?,
                max_failures_per_identifier: env_var_or(
                    "RATE_LIMIT_MAX_FAILURES_PER_IDENTIFIER",
                    "5",
                )?
                .parse()
                .context("Invalid RATE_LIMIT_MAX_FAILURES_PER_IDENTIFIER value")?,
            },
            bridge: BridgeConfig {
                ttl_secs: bridge_ttl.min(BRIDGE_TTL_CEILING_SECS),
            },
            signing: SigningKeys::from_env(environment)
                .map_err(|e| anyhow::anyhow!("{e}"))?,
        };

        Ok(config)
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> Result<String> {
    Ok(env::var(key).unwrap_or_else(|_| default.to_string()))
}
