// ABOUTME: Login throttle: sliding-window counters over the auth event log
// ABOUTME: Three gates (origin volume, origin failures, identifier failures), all generic 429
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use crate::config::RateLimitConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use chrono::{Duration, Utc};
use uuid::Uuid;

/// Bucket used when the edge did not hand us a client address. All such
/// requests share one budget rather than getting an unlimited one.
pub const UNKNOWN_ORIGIN: &str = "unknown";

/// Sliding-window login throttle.
///
/// Counters are derived from the `auth_events` log rather than an in-memory
/// map, so the gates hold across restarts and across instances sharing a
/// database. The response never reveals which gate tripped.
#[derive(Debug, Clone)]
pub struct LoginRateLimiter {
    config: RateLimitConfig,
}

impl LoginRateLimiter {
    #[must_use]
    pub const fn new(config: RateLimitConfig) -> Self {
        Self { config }
    }

    /// Check all three gates for a login attempt before any credential work.
    ///
    /// # Errors
    /// Returns a rate-limit error with a retry hint when any gate is over
    /// budget, or a database error if the counters cannot be read
    pub async fn check_login_attempt(
        &self,
        database: &Database,
        origin_ip: Option<&str>,
        identifier: &str,
        tenant_id: Option<Uuid>,
    ) -> AppResult<()> {
        let now = Utc::now();
        let origin = origin_ip.unwrap_or(UNKNOWN_ORIGIN);

        let attempt_window = now - Duration::seconds(self.config.window_secs);
        let attempts = database
            .count_attempts_from_origin(origin, attempt_window)
            .await?;
        if attempts >= self.config.max_attempts_per_origin {
            tracing::warn!(origin = %origin, attempts, "Login volume gate tripped");
            return Err(self.throttled());
        }

        let failure_window = now - Duration::seconds(self.config.failure_window_secs);
        let origin_failures = database
            .count_failures_from_origin(origin, failure_window)
            .await?;
        if origin_failures >= self.config.max_failures_per_origin {
            tracing::warn!(origin = %origin, failures = origin_failures, "Origin failure gate tripped");
            return Err(self.throttled());
        }

        let identifier_failures = database
            .count_failures_for_identifier(identifier, tenant_id, failure_window)
            .await?;
        if identifier_failures >= self.config.max_failures_per_identifier {
            tracing::warn!(failures = identifier_failures, "Identifier failure gate tripped");
            return Err(self.throttled());
        }

        Ok(())
    }

    fn throttled(&self) -> AppError {
        AppError::throttled(self.config.retry_after_secs())
    }
}
