// ABOUTME: End-to-end router tests for the operator console to tenant portal flow
// ABOUTME: Exercises host scoping, bearer auth, bridge issue, and redemption over HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{
    create_test_database, create_test_operator, create_test_tenant, create_test_user,
    tenant_host, test_resources, PLATFORM_HOST,
};
use limsgate::models::OperatorRole;
use limsgate::server::build_router;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send_json(
    router: Router,
    host: &str,
    path: &str,
    bearer: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("host", host)
        .header("content-type", "application/json")
        .header("x-forwarded-for", "192.0.2.77");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn operator_walks_the_bridge_into_a_tenant() {
    let db = create_test_database().await.unwrap();
    let tenant = create_test_tenant(&db.database, "acme", "acme").await.unwrap();
    create_test_operator(&db.database, "root@ops.test", "op-secret-9", OperatorRole::SuperOperator)
        .await
        .unwrap();

    let resources = test_resources(db.database.clone());
    let router = build_router(resources);

    // 1. Console login on the platform host
    let (status, login) = send_json(
        router.clone(),
        PLATFORM_HOST,
        "/auth/login",
        None,
        json!({ "identifier": "root@ops.test", "secret": "op-secret-9" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = login["access_token"].as_str().unwrap().to_string();

    // 2. Open the tenant, receiving a bridge token and redirect host
    let (status, opened) = send_json(
        router.clone(),
        PLATFORM_HOST,
        "/operator/impersonation/open-tenant",
        Some(&access),
        json!({ "tenant_id": tenant.id.to_string() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        opened["tenant"]["redirect_host"].as_str().unwrap(),
        tenant_host("acme")
    );
    let bridge_token = opened["bridge_token"].as_str().unwrap().to_string();

    // 3. Redeem on the tenant host for an impersonation session
    let (status, portal) = send_json(
        router.clone(),
        &tenant_host("acme"),
        "/auth/portal-login",
        None,
        json!({ "bridge_token": bridge_token.clone() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(portal["purpose"].as_str().unwrap(), "impersonation");
    assert!(portal["access_token"].as_str().is_some());

    // 4. The bridge token is spent
    let (status, _) = send_json(
        router,
        &tenant_host("acme"),
        "/auth/portal-login",
        None,
        json!({ "bridge_token": bridge_token }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn console_routes_reject_tenant_hosts_and_missing_auth() {
    let db = create_test_database().await.unwrap();
    let tenant = create_test_tenant(&db.database, "acme", "acme").await.unwrap();
    create_test_operator(&db.database, "root@ops.test", "op-secret-9", OperatorRole::SuperOperator)
        .await
        .unwrap();

    let router = build_router(test_resources(db.database.clone()));

    // No bearer token
    let (status, _) = send_json(
        router.clone(),
        PLATFORM_HOST,
        "/operator/impersonation/open-tenant",
        None,
        json!({ "tenant_id": tenant.id.to_string() }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Valid operator session, wrong host
    let (_, login) = send_json(
        router.clone(),
        PLATFORM_HOST,
        "/auth/login",
        None,
        json!({ "identifier": "root@ops.test", "secret": "op-secret-9" }),
    )
    .await;
    let access = login["access_token"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        router,
        &tenant_host("acme"),
        "/operator/impersonation/open-tenant",
        Some(&access),
        json!({ "tenant_id": tenant.id.to_string() }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn console_mirror_paths_serve_the_platform_host_only() {
    let db = create_test_database().await.unwrap();
    let tenant = create_test_tenant(&db.database, "acme", "acme").await.unwrap();
    create_test_operator(&db.database, "root@ops.test", "op-secret-9", OperatorRole::SuperOperator)
        .await
        .unwrap();

    let router = build_router(test_resources(db.database.clone()));

    let (status, login) = send_json(
        router.clone(),
        PLATFORM_HOST,
        "/operator/auth/login",
        None,
        json!({ "identifier": "root@ops.test", "secret": "op-secret-9" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let refresh_token = login["refresh_token"].as_str().unwrap().to_string();

    // The console paths are dead on a tenant host
    let (status, _) = send_json(
        router.clone(),
        &tenant_host("acme"),
        "/operator/auth/login",
        None,
        json!({ "identifier": "root@ops.test", "secret": "op-secret-9" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, refreshed) = send_json(
        router.clone(),
        PLATFORM_HOST,
        "/operator/auth/refresh",
        None,
        json!({ "refresh_token": refresh_token }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = refreshed["refresh_token"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        router,
        PLATFORM_HOST,
        "/operator/auth/logout",
        None,
        json!({ "refresh_token": rotated }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn tenant_login_rejected_on_unknown_host() {
    let db = create_test_database().await.unwrap();
    let tenant = create_test_tenant(&db.database, "acme", "acme").await.unwrap();
    create_test_user(&db.database, &tenant, "ana@acme.test", "hunter2-long")
        .await
        .unwrap();

    let router = build_router(test_resources(db.database.clone()));

    let (status, _) = send_json(
        router.clone(),
        &tenant_host("ghost"),
        "/auth/login",
        None,
        json!({ "identifier": "ana@acme.test", "secret": "hunter2-long" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Same request on the real host succeeds
    let (status, _) = send_json(
        router,
        &tenant_host("acme"),
        "/auth/login",
        None,
        json!({ "identifier": "ana@acme.test", "secret": "hunter2-long" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_answers_on_any_host() {
    let db = create_test_database().await.unwrap();
    let router = build_router(test_resources(db.database.clone()));

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .header("host", "anything.example.com")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"].as_str().unwrap(), "ok");
    assert_eq!(body["database"].as_str().unwrap(), "ok");
}
