// ABOUTME: Integration tests for refresh-token rotation chains and reuse handling
// ABOUTME: Covers lineage links, reuse revocation, expiry, and concurrent rotation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

mod common;

use chrono::{Duration, Utc};
use common::create_test_database;
use limsgate::crypto::{generate_token_secret, hash_token_secret};
use limsgate::models::{PrincipalKind, RefreshTokenRecord, RequestOrigin};
use limsgate::refresh_tokens::{RawRefreshToken, RefreshTokenManager};
use uuid::Uuid;

fn origin() -> RequestOrigin {
    RequestOrigin::from_ip("203.0.113.7")
}

#[tokio::test]
async fn rotation_builds_forward_linked_chain() {
    let db = create_test_database().await.unwrap();
    let manager = RefreshTokenManager::new(30);
    let principal = Uuid::new_v4();
    let tenant = Uuid::new_v4();

    let first = manager
        .issue(
            &db.database,
            PrincipalKind::TenantUser,
            principal,
            Some(tenant),
            &origin(),
        )
        .await
        .unwrap();

    let raw = RawRefreshToken::parse(&first.token).unwrap();
    let (second, _) = manager.rotate(&db.database, &raw, &origin()).await.unwrap();
    let raw2 = RawRefreshToken::parse(&second.token).unwrap();
    let (third, _) = manager.rotate(&db.database, &raw2, &origin()).await.unwrap();

    let lineage = db
        .database
        .get_refresh_lineage(first.record.lineage_id)
        .await
        .unwrap();
    assert_eq!(lineage.len(), 3);

    let get = |id: Uuid| lineage.iter().find(|r| r.id == id).unwrap();
    let a = get(first.record.id);
    let b = get(second.record.id);
    let c = get(third.record.id);

    // Retired links point forward and are revoked; the head is live
    assert_eq!(a.replaced_by_id, Some(b.id));
    assert!(a.revoked_at.is_some());
    assert_eq!(b.replaced_by_id, Some(c.id));
    assert!(b.revoked_at.is_some());
    assert!(c.replaced_by_id.is_none());
    assert!(c.is_live(Utc::now()));

    // Lineage is shared along the chain
    assert_eq!(b.lineage_id, first.record.lineage_id);
    assert_eq!(c.lineage_id, first.record.lineage_id);
    assert_eq!(c.tenant_id, Some(tenant));
}

#[tokio::test]
async fn presenting_rotated_token_revokes_entire_lineage() {
    let db = create_test_database().await.unwrap();
    let manager = RefreshTokenManager::new(30);
    let principal = Uuid::new_v4();

    let first = manager
        .issue(
            &db.database,
            PrincipalKind::TenantUser,
            principal,
            None,
            &origin(),
        )
        .await
        .unwrap();
    let raw = RawRefreshToken::parse(&first.token).unwrap();
    let (second, _) = manager.rotate(&db.database, &raw, &origin()).await.unwrap();

    // The old token comes back: someone is replaying it
    let err = manager
        .rotate(&db.database, &raw, &origin())
        .await
        .unwrap_err();
    assert_eq!(err.code, limsgate::errors::ErrorCode::AuthInvalid);

    // The still-live successor is dead too
    let head = db
        .database
        .get_refresh_token(second.record.id)
        .await
        .unwrap()
        .unwrap();
    assert!(head.revoked_at.is_some());

    // And the successor no longer rotates
    let raw2 = RawRefreshToken::parse(&second.token).unwrap();
    assert!(manager.rotate(&db.database, &raw2, &origin()).await.is_err());
}

#[tokio::test]
async fn expired_token_fails_without_burning_siblings() {
    let db = create_test_database().await.unwrap();
    let manager = RefreshTokenManager::new(30);
    let lineage = Uuid::new_v4();

    // Hand-build an already-expired token in a lineage that also has a
    // live head, mimicking an old link that somehow was not revoked
    let secret = generate_token_secret().unwrap();
    let now = Utc::now();
    let expired = RefreshTokenRecord {
        id: Uuid::new_v4(),
        principal_kind: PrincipalKind::TenantUser,
        principal_id: Uuid::new_v4(),
        lineage_id: lineage,
        secret_hash: hash_token_secret(&secret),
        tenant_id: None,
        expires_at: now - Duration::hours(1),
        revoked_at: None,
        replaced_by_id: None,
        created_at: now - Duration::days(31),
        created_from_ip: None,
        client_info: None,
    };
    db.database.insert_refresh_token(&expired).await.unwrap();

    let live_secret = generate_token_secret().unwrap();
    let live = RefreshTokenRecord {
        id: Uuid::new_v4(),
        secret_hash: hash_token_secret(&live_secret),
        expires_at: now + Duration::days(20),
        created_at: now,
        ..expired.clone()
    };
    db.database.insert_refresh_token(&live).await.unwrap();

    let raw = RawRefreshToken::parse(&format!("{}.{secret}", expired.id)).unwrap();
    assert!(manager.rotate(&db.database, &raw, &origin()).await.is_err());

    // Expiry is natural death, not reuse; the live sibling survives
    let sibling = db
        .database
        .get_refresh_token(live.id)
        .await
        .unwrap()
        .unwrap();
    assert!(sibling.is_live(Utc::now()));
}

#[tokio::test]
async fn wrong_secret_has_no_side_effects() {
    let db = create_test_database().await.unwrap();
    let manager = RefreshTokenManager::new(30);

    let issued = manager
        .issue(
            &db.database,
            PrincipalKind::PlatformOperator,
            Uuid::new_v4(),
            None,
            &origin(),
        )
        .await
        .unwrap();

    let forged = RawRefreshToken::parse(&format!(
        "{}.{}",
        issued.record.id,
        "0".repeat(64)
    ))
    .unwrap();
    assert!(manager.rotate(&db.database, &forged, &origin()).await.is_err());

    // A bad guess proves nothing; the real token still works
    let real = RawRefreshToken::parse(&issued.token).unwrap();
    assert!(manager.rotate(&db.database, &real, &origin()).await.is_ok());
}

#[tokio::test]
async fn validate_is_read_only() {
    let db = create_test_database().await.unwrap();
    let manager = RefreshTokenManager::new(30);

    let issued = manager
        .issue(
            &db.database,
            PrincipalKind::TenantUser,
            Uuid::new_v4(),
            None,
            &origin(),
        )
        .await
        .unwrap();
    let raw = RawRefreshToken::parse(&issued.token).unwrap();

    let record = manager.validate(&db.database, &raw).await.unwrap();
    assert_eq!(record.id, issued.record.id);

    // Validation does not rotate; the token rotates fine afterwards
    assert!(manager.rotate(&db.database, &raw, &origin()).await.is_ok());
}

#[tokio::test]
async fn logout_revokes_and_later_reuse_burns_lineage() {
    let db = create_test_database().await.unwrap();
    let manager = RefreshTokenManager::new(30);

    let issued = manager
        .issue(
            &db.database,
            PrincipalKind::TenantUser,
            Uuid::new_v4(),
            None,
            &origin(),
        )
        .await
        .unwrap();
    let raw = RawRefreshToken::parse(&issued.token).unwrap();

    manager.revoke(&db.database, &raw, &origin()).await.unwrap();
    // Idempotent
    manager.revoke(&db.database, &raw, &origin()).await.unwrap();

    let stored = db
        .database
        .get_refresh_token(issued.record.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.revoked_at.is_some());

    // Rotating a revoked token is indistinguishable from replay
    assert!(manager.rotate(&db.database, &raw, &origin()).await.is_err());
}

#[tokio::test]
async fn concurrent_rotation_has_exactly_one_winner() {
    let db = create_test_database().await.unwrap();
    let manager = RefreshTokenManager::new(30);

    let issued = manager
        .issue(
            &db.database,
            PrincipalKind::TenantUser,
            Uuid::new_v4(),
            None,
            &origin(),
        )
        .await
        .unwrap();
    let raw = RawRefreshToken::parse(&issued.token).unwrap();

    let o = origin();
    let (a, b) = tokio::join!(
        manager.rotate(&db.database, &raw, &o),
        manager.rotate(&db.database, &raw, &o),
    );

    let winners = usize::from(a.is_ok()) + usize::from(b.is_ok());
    assert_eq!(winners, 1, "exactly one rotation may win");
}
