// ABOUTME: Integration tests for the one-time operator-to-tenant bridge
// ABOUTME: Covers role checks, tenant binding, single use, and concurrent redemption
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

mod common;

use chrono::{Duration, Utc};
use common::{
    create_test_database, create_test_operator, create_test_tenant, TENANT_BASE_DOMAIN,
};
use limsgate::auth::{AuthManager, TokenPurpose};
use limsgate::bridge::{ImpersonationBridge, RawBridgeToken};
use limsgate::config::SigningKeys;
use limsgate::crypto::hash_token_secret;
use limsgate::errors::ErrorCode;
use limsgate::models::{BridgeTokenRecord, OperatorRole, RequestOrigin};
use sqlx::Row;
use uuid::Uuid;

fn auth_manager() -> AuthManager {
    AuthManager::new(SigningKeys::from_secret(b"bridge-test-secret".to_vec()), 900)
}

fn bridge() -> ImpersonationBridge {
    ImpersonationBridge::new(90, TENANT_BASE_DOMAIN)
}

fn origin() -> RequestOrigin {
    RequestOrigin::from_ip("198.51.100.4")
}

#[tokio::test]
async fn auditor_role_cannot_issue_bridge() {
    let db = create_test_database().await.unwrap();
    let tenant = create_test_tenant(&db.database, "acme", "acme").await.unwrap();
    let auditor = create_test_operator(&db.database, "aud@ops.test", "pw", OperatorRole::Auditor)
        .await
        .unwrap();

    let err = bridge()
        .issue(&db.database, &auditor, tenant.id, &origin())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PermissionDenied);
}

#[tokio::test]
async fn issue_and_redeem_round_trip() {
    let db = create_test_database().await.unwrap();
    let tenant = create_test_tenant(&db.database, "acme", "acme").await.unwrap();
    let operator =
        create_test_operator(&db.database, "root@ops.test", "pw", OperatorRole::SuperOperator)
            .await
            .unwrap();

    let auth = auth_manager();
    let issued = bridge()
        .issue(&db.database, &operator, tenant.id, &origin())
        .await
        .unwrap();
    assert_eq!(issued.redirect_host, format!("acme.{TENANT_BASE_DOMAIN}"));
    assert!(issued.expires_at > Utc::now().timestamp());

    let raw = RawBridgeToken::parse(&issued.token).unwrap();
    let redeemed = bridge()
        .redeem(&db.database, &auth, &raw, &tenant, &origin())
        .await
        .unwrap();
    assert_eq!(redeemed.operator_id, operator.id);
    assert_eq!(redeemed.tenant_id, tenant.id);

    // The minted session is an impersonation session attributed to the operator
    let claims = auth.validate_token(&redeemed.access_token).unwrap();
    assert_eq!(claims.purpose, TokenPurpose::Impersonation);
    assert_eq!(claims.sub, operator.id.to_string());
    assert_eq!(
        claims.impersonator.as_deref(),
        Some(operator.id.to_string().as_str())
    );
    assert_eq!(claims.tenant_id.as_deref(), Some(tenant.id.to_string().as_str()));

    // Both sides of the handoff land in the operator audit trail
    let rows = sqlx::query("SELECT action FROM audit_events WHERE actor_id = ? ORDER BY id")
        .bind(operator.id.to_string())
        .fetch_all(db.database.pool())
        .await
        .unwrap();
    let actions: Vec<String> = rows.iter().map(|r| r.get("action")).collect();
    assert_eq!(actions, vec!["bridge_issued", "bridge_redeemed"]);
}

#[tokio::test]
async fn wrong_tenant_host_leaves_token_redeemable() {
    let db = create_test_database().await.unwrap();
    let acme = create_test_tenant(&db.database, "acme", "acme").await.unwrap();
    let rival = create_test_tenant(&db.database, "rival", "rival").await.unwrap();
    let operator =
        create_test_operator(&db.database, "root@ops.test", "pw", OperatorRole::SuperOperator)
            .await
            .unwrap();

    let auth = auth_manager();
    let issued = bridge()
        .issue(&db.database, &operator, acme.id, &origin())
        .await
        .unwrap();
    let raw = RawBridgeToken::parse(&issued.token).unwrap();

    let err = bridge()
        .redeem(&db.database, &auth, &raw, &rival, &origin())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PermissionDenied);

    // The mismatch did not consume it; the right host still works
    assert!(bridge()
        .redeem(&db.database, &auth, &raw, &acme, &origin())
        .await
        .is_ok());
}

#[tokio::test]
async fn second_redemption_fails() {
    let db = create_test_database().await.unwrap();
    let tenant = create_test_tenant(&db.database, "acme", "acme").await.unwrap();
    let operator =
        create_test_operator(&db.database, "root@ops.test", "pw", OperatorRole::SuperOperator)
            .await
            .unwrap();

    let auth = auth_manager();
    let issued = bridge()
        .issue(&db.database, &operator, tenant.id, &origin())
        .await
        .unwrap();
    let raw = RawBridgeToken::parse(&issued.token).unwrap();

    assert!(bridge()
        .redeem(&db.database, &auth, &raw, &tenant, &origin())
        .await
        .is_ok());
    let err = bridge()
        .redeem(&db.database, &auth, &raw, &tenant, &origin())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthInvalid);
}

#[tokio::test]
async fn expired_bridge_token_is_dead() {
    let db = create_test_database().await.unwrap();
    let tenant = create_test_tenant(&db.database, "acme", "acme").await.unwrap();
    let operator =
        create_test_operator(&db.database, "root@ops.test", "pw", OperatorRole::SuperOperator)
            .await
            .unwrap();

    let secret = "e".repeat(64);
    let now = Utc::now();
    let record = BridgeTokenRecord {
        id: Uuid::new_v4(),
        operator_id: operator.id,
        tenant_id: tenant.id,
        secret_hash: hash_token_secret(&secret),
        expires_at: now - Duration::seconds(5),
        consumed_at: None,
        created_at: now - Duration::seconds(100),
        issued_from_ip: None,
        consumed_from_ip: None,
    };
    db.database.insert_bridge_token(&record).await.unwrap();

    let raw = RawBridgeToken::parse(&format!("{}.{secret}", record.id)).unwrap();
    let err = bridge()
        .redeem(&db.database, &auth_manager(), &raw, &tenant, &origin())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthInvalid);
}

#[tokio::test]
async fn inactive_tenant_cannot_be_opened() {
    let db = create_test_database().await.unwrap();
    let tenant = create_test_tenant(&db.database, "acme", "acme").await.unwrap();
    db.database.set_tenant_active(tenant.id, false).await.unwrap();
    let operator =
        create_test_operator(&db.database, "root@ops.test", "pw", OperatorRole::SuperOperator)
            .await
            .unwrap();

    let err = bridge()
        .issue(&db.database, &operator, tenant.id, &origin())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn concurrent_redemption_has_exactly_one_winner() {
    let db = create_test_database().await.unwrap();
    let tenant = create_test_tenant(&db.database, "acme", "acme").await.unwrap();
    let operator =
        create_test_operator(&db.database, "root@ops.test", "pw", OperatorRole::SuperOperator)
            .await
            .unwrap();

    let auth = auth_manager();
    let issued = bridge()
        .issue(&db.database, &operator, tenant.id, &origin())
        .await
        .unwrap();
    let raw = RawBridgeToken::parse(&issued.token).unwrap();

    let b = bridge();
    let o = origin();
    let (first, second) = tokio::join!(
        b.redeem(&db.database, &auth, &raw, &tenant, &o),
        b.redeem(&db.database, &auth, &raw, &tenant, &o),
    );

    let winners = usize::from(first.is_ok()) + usize::from(second.is_ok());
    assert_eq!(winners, 1, "a bridge token redeems at most once");
}
