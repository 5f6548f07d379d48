// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides database, fixture, and server-resource helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers
#![allow(dead_code, clippy::missing_errors_doc, clippy::missing_panics_doc)]

use anyhow::Result;
use limsgate::{
    config::{BridgeConfig, Environment, RateLimitConfig, ServerConfig, SigningKeys},
    database::Database,
    models::{OperatorRole, PlatformOperator, Tenant, TenantUser},
    server::ServerResources,
};
use std::sync::{Arc, Once};
use uuid::Uuid;

/// Low bcrypt cost keeps test fixtures fast; never used outside tests
pub const TEST_BCRYPT_COST: u32 = 4;

pub const PLATFORM_HOST: &str = "ops.limsgate.test";
pub const TENANT_BASE_DOMAIN: &str = "limsgate.test";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

/// A migrated database backed by a temp file that lives as long as this
/// handle. File-backed because pooled in-memory `SQLite` connections do not
/// share data.
pub struct TestDb {
    pub database: Database,
    _dir: tempfile::TempDir,
}

/// Standard test database setup
pub async fn create_test_database() -> Result<TestDb> {
    init_test_logging();
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite:{}/test.db", dir.path().display());
    let database = Database::new(&url).await?;
    database.migrate().await?;
    Ok(TestDb {
        database,
        _dir: dir,
    })
}

/// Configuration with test hosts and a fixed signing secret
pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        database_url: String::new(),
        environment: Environment::Development,
        platform_host: PLATFORM_HOST.to_string(),
        tenant_base_domain: TENANT_BASE_DOMAIN.to_string(),
        access_token_ttl_secs: 900,
        refresh_token_ttl_days: 30,
        rate_limit: RateLimitConfig::default(),
        bridge: BridgeConfig::default(),
        signing: SigningKeys::from_secret(b"integration-test-signing-secret".to_vec()),
    }
}

/// Wire full server resources over a test database
pub fn test_resources(database: Database) -> Arc<ServerResources> {
    Arc::new(ServerResources::new(database, test_config()))
}

/// Wire server resources with a custom configuration
pub fn test_resources_with_config(database: Database, config: ServerConfig) -> Arc<ServerResources> {
    Arc::new(ServerResources::new(database, config))
}

/// Create an active tenant with the given code and subdomain
pub async fn create_test_tenant(database: &Database, code: &str, subdomain: &str) -> Result<Tenant> {
    let tenant = Tenant::new(
        code.to_string(),
        format!("{code} laboratory"),
        Some(subdomain.to_string()),
    );
    database.create_tenant(&tenant).await?;
    Ok(tenant)
}

/// Create an active tenant user who is a member of the given tenant
pub async fn create_test_user(
    database: &Database,
    tenant: &Tenant,
    email: &str,
    password: &str,
) -> Result<TenantUser> {
    let hash = bcrypt::hash(password, TEST_BCRYPT_COST)?;
    let user = TenantUser::new(email.to_string(), hash, Some("Test User".to_string()), tenant.id);
    database.create_tenant_user(&user).await?;
    database.add_tenant_membership(user.id, tenant.id).await?;
    Ok(user)
}

/// Create an active platform operator
pub async fn create_test_operator(
    database: &Database,
    email: &str,
    password: &str,
    role: OperatorRole,
) -> Result<PlatformOperator> {
    let hash = bcrypt::hash(password, TEST_BCRYPT_COST)?;
    let operator = PlatformOperator::new(
        email.to_string(),
        hash,
        Some("Test Operator".to_string()),
        role,
    );
    database.create_operator(&operator).await?;
    Ok(operator)
}

/// Host for a tenant subdomain under the test base domain
pub fn tenant_host(subdomain: &str) -> String {
    format!("{subdomain}.{TENANT_BASE_DOMAIN}")
}

/// A random UUID that is in no table
pub fn missing_id() -> Uuid {
    Uuid::new_v4()
}
