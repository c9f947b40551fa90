// ABOUTME: End-to-end HTTP tests for the gateway, admin and audit routes
// ABOUTME: Drives the full router with oneshot requests; no tenant database is ever reached
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlgate::crypto::seal_envelope;
use sqlgate::errors::GENERIC_CRYPTO_MESSAGE;
use sqlgate::models::{AuditQuery, AuditStatus, TenantKey};
use sqlgate::resources::ServerResources;
use sqlgate::routes;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    _dir: TempDir,
    resources: Arc<ServerResources>,
    router: Router,
}

struct TestResponse {
    status: StatusCode,
    request_id: Option<String>,
    retry_after: Option<String>,
    body: Value,
}

async fn app_with(configure: impl FnOnce(&mut sqlgate::config::ServerConfig)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = common::test_config(&dir);
    configure(&mut config);
    let resources = common::create_test_resources(config).await;
    let router = routes::router(&resources);
    TestApp {
        _dir: dir,
        resources,
        router,
    }
}

async fn app() -> TestApp {
    app_with(|_| {}).await
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .map(|v| v.to_str().unwrap().to_owned())
        };
        let request_id = header("x-request-id");
        let retry_after = header("retry-after");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse {
            status,
            request_id,
            retry_after,
            body,
        }
    }

    async fn post_sql(&self, path: &str, actor: Option<&str>, body: &Value) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(actor) = actor {
            builder = builder.header("x-sqlgate-actor", actor);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn admin(&self, method: Method, path: &str, body: Option<&Value>) -> TestResponse {
        let builder = Request::builder()
            .method(method)
            .uri(path)
            .header("authorization", format!("Bearer {}", common::ADMIN_TOKEN))
            .header("content-type", "application/json");
        let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
        self.send(builder.body(body).unwrap()).await
    }

    async fn audit_records(&self) -> Vec<sqlgate::models::AuditRecord> {
        self.resources
            .audit
            .query(&AuditQuery::default())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let response = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_tenant_is_not_found_and_not_audited() {
    let app = app().await;
    let response = app
        .post_sql(
            "/api/v1/ghost/prod/sql",
            Some("alice"),
            &json!({"sql": "select 1 limit 1"}),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["ok"], false);
    assert!(response.request_id.is_some());
    assert!(app.audit_records().await.is_empty());
}

#[tokio::test]
async fn test_select_without_limit_is_blocked_and_audited() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", r#"{"maxSelectLimit":500}"#).await;

    let response = app
        .post_sql(
            "/api/v1/shop/prod/sql",
            Some("alice"),
            &json!({"sql": "select * from orders"}),
        )
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "SELECT must include LIMIT.");
    let request_id = response.request_id.unwrap();
    assert_eq!(response.body["requestId"], request_id);

    let records = app.audit_records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AuditStatus::Blocked);
    assert_eq!(records[0].request_id, request_id);
    assert_eq!(records[0].actor.as_deref(), Some("alice"));
    assert_eq!(records[0].endpoint, "sql");
    assert_eq!(records[0].preview.as_deref(), Some("select * from orders"));
}

#[tokio::test]
async fn test_stacked_statements_are_blocked() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", "{}").await;

    let response = app
        .post_sql(
            "/api/v1/shop/prod/sql",
            Some("alice"),
            &json!({"sql": "select * from orders limit 1; drop table orders"}),
        )
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "multiple statements not allowed");
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", "{}").await;

    let response = app
        .send(
            Request::post("/api/v1/shop/prod/sql")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(app.audit_records().await.is_empty());

    let response = app
        .post_sql("/api/v1/shop/prod/sql", Some("alice"), &json!({"query": "select 1"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.audit_records().await[0].status, AuditStatus::Blocked);
}

#[tokio::test]
async fn test_rate_limit_rejects_before_validation() {
    let app = app_with(|config| config.rate_limit.max_requests = 1).await;
    common::seed_tenant(&app.resources, "shop", "prod", "{}").await;
    let body = json!({"sql": "select * from orders"});

    let first = app
        .post_sql("/api/v1/shop/prod/sql", Some("alice"), &body)
        .await;
    assert_eq!(first.status, StatusCode::FORBIDDEN);

    let second = app
        .post_sql("/api/v1/shop/prod/sql", Some("alice"), &body)
        .await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(second.retry_after.is_some());
    assert_eq!(second.body["details"]["limit"], 1);

    // Another caller has its own window
    let other = app
        .post_sql("/api/v1/shop/prod/sql", Some("bob"), &body)
        .await;
    assert_eq!(other.status, StatusCode::FORBIDDEN);

    let records = app.audit_records().await;
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].status, AuditStatus::RateLimited);
}

#[tokio::test]
async fn test_required_envelope_rejects_plaintext() {
    let app = app().await;
    let mut record = common::tenant_record(&app.resources, "shop", "prod", "{}");
    record.require_envelope = true;
    app.resources
        .database
        .upsert_tenant_config(&record)
        .await
        .unwrap();

    let response = app
        .post_sql(
            "/api/v1/shop/prod/sql",
            Some("alice"),
            &json!({"sql": "select 1 limit 1"}),
        )
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "encrypted request envelope required");
}

#[tokio::test]
async fn test_envelope_uses_tenant_passphrase() {
    let app = app().await;
    let mut record = common::tenant_record(&app.resources, "shop", "prod", "{}");
    record.envelope_secret_enc = Some(app.resources.vault.encrypt("tenant-passphrase").unwrap());
    app.resources
        .database
        .upsert_tenant_config(&record)
        .await
        .unwrap();
    let inner = json!({"sql": "select * from orders"});

    let wrong = seal_envelope(&inner, "wrong-passphrase").unwrap();
    let response = app
        .post_sql(
            "/api/v1/shop/prod/sql",
            Some("alice"),
            &serde_json::to_value(&wrong).unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], GENERIC_CRYPTO_MESSAGE);

    // The right passphrase gets through to policy validation
    let right = seal_envelope(&inner, "tenant-passphrase").unwrap();
    let response = app
        .post_sql(
            "/api/v1/shop/prod/sql",
            Some("alice"),
            &serde_json::to_value(&right).unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "SELECT must include LIMIT.");
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", "{}").await;

    let missing = app
        .send(
            Request::post("/api/v1/admin/shop/prod/invalidate")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let wrong = app
        .send(
            Request::post("/api/v1/admin/shop/prod/invalidate")
                .header("authorization", "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["error"], "Invalid bearer token");

    let disabled = app_with(|config| config.admin_token = None).await;
    let response = disabled
        .admin(Method::POST, "/api/v1/admin/shop/prod/invalidate", None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_token_is_checked_before_input() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", "{}").await;

    let unauthenticated_save = app
        .send(
            Request::put("/api/v1/admin/shop/prod/apis/recent-orders")
                .header("content-type", "text/plain")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(unauthenticated_save.status, StatusCode::UNAUTHORIZED);

    let unauthenticated_audit = app
        .send(
            Request::get("/api/v1/audit?limit=lots")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(unauthenticated_audit.status, StatusCode::UNAUTHORIZED);

    let disabled = app_with(|config| config.admin_token = None).await;
    let response = disabled
        .send(
            Request::put("/api/v1/admin/shop/prod/apis/recent-orders")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let malformed = app
        .admin(Method::GET, "/api/v1/audit?limit=lots", None)
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    let bad_body = app
        .send(
            Request::put("/api/v1/admin/shop/prod/apis/recent-orders")
                .header("authorization", format!("Bearer {}", common::ADMIN_TOKEN))
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(bad_body.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalidate_picks_up_new_policy() {
    let app = app().await;
    let key = common::seed_tenant(&app.resources, "shop", "prod", "{}").await;
    let body = json!({"sql": "delete from orders where id = 1"});

    let response = app
        .post_sql("/api/v1/shop/prod/sql", Some("alice"), &body)
        .await;
    assert_eq!(response.body["error"], "statement type 'delete' not allowed");

    let record = common::tenant_record(
        &app.resources,
        &key.project,
        &key.environment,
        r#"{"allowedStatementTypes":["select","delete"],"allowedTables":["products"]}"#,
    );
    app.resources
        .database
        .upsert_tenant_config(&record)
        .await
        .unwrap();

    // Still served from cache
    let response = app
        .post_sql("/api/v1/shop/prod/sql", Some("alice"), &body)
        .await;
    assert_eq!(response.body["error"], "statement type 'delete' not allowed");

    let response = app
        .admin(Method::POST, "/api/v1/admin/shop/prod/invalidate", None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["tenant"], "shop/prod");

    let response = app
        .post_sql("/api/v1/shop/prod/sql", Some("alice"), &body)
        .await;
    assert_eq!(response.body["error"], "table(s) not allowed: orders");
}

#[tokio::test]
async fn test_probe_reports_unreachable_tenant() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", "{}").await;

    let response = app
        .admin(Method::POST, "/api/v1/admin/shop/prod/probe", None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["ok"], false);
    assert!(response.body["error"].is_string());
}

async fn save_recent_orders(app: &TestApp, auth_mode: &str) -> TestResponse {
    app.admin(
        Method::PUT,
        "/api/v1/admin/shop/prod/apis/recent-orders",
        Some(&json!({
            "sqlTemplate": "select id, total from orders where user_id = :userId limit 20",
            "statementType": "select",
            "paramsSchema": [
                {"name": "userId", "type": "integer", "required": true},
                {"name": "status", "type": "string", "enum": ["open", "closed"]}
            ],
            "authMode": auth_mode
        })),
    )
    .await
}

#[tokio::test]
async fn test_api_definition_admin_round() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", "{}").await;

    let saved = save_recent_orders(&app, "token").await;
    assert_eq!(saved.status, StatusCode::OK);
    assert_eq!(saved.body["api"]["version"], 1);

    let listed = app
        .admin(Method::GET, "/api/v1/admin/shop/prod/apis", None)
        .await;
    assert_eq!(listed.body["apis"].as_array().unwrap().len(), 1);

    let rejected = app
        .admin(
            Method::PUT,
            "/api/v1/admin/shop/prod/apis/bad",
            Some(&json!({
                "sqlTemplate": "select * from orders where id = :id limit 5",
                "statementType": "select"
            })),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.body["error"], "undeclared placeholder: id");

    let deleted = app
        .admin(Method::DELETE, "/api/v1/admin/shop/prod/apis/recent-orders", None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let gone = app
        .post_sql(
            "/api/v1/shop/prod/apis/recent-orders",
            Some("alice"),
            &json!({"userId": 7}),
        )
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_api_requires_caller_identity() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", "{}").await;
    save_recent_orders(&app, "token").await;

    let response = app
        .post_sql("/api/v1/shop/prod/apis/recent-orders", None, &json!({"userId": 7}))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let records = app.audit_records().await;
    assert_eq!(records[0].status, AuditStatus::Blocked);
    assert_eq!(records[0].endpoint, "api:recent-orders");
}

#[tokio::test]
async fn test_public_api_needs_public_access_policy() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", "{}").await;
    save_recent_orders(&app, "public").await;

    let response = app
        .post_sql(
            "/api/v1/shop/prod/apis/recent-orders",
            None,
            &json!({"userId": "abc"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let open = app_with(|_| {}).await;
    common::seed_tenant(&open.resources, "shop", "prod", r#"{"publicAccess":true}"#).await;
    save_recent_orders(&open, "public").await;

    // Anonymous call passes authorization and fails parameter validation
    let response = open
        .post_sql(
            "/api/v1/shop/prod/apis/recent-orders",
            None,
            &json!({"userId": "abc"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_parameter_errors_are_listed() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", "{}").await;
    save_recent_orders(&app, "token").await;

    let response = app
        .post_sql(
            "/api/v1/shop/prod/apis/recent-orders",
            Some("alice"),
            &json!({"status": "lost", "sneaky": 1}),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "parameter validation failed");
    let details = response.body["details"].as_array().unwrap();
    let params: Vec<&str> = details
        .iter()
        .map(|d| d["param"].as_str().unwrap())
        .collect();
    assert_eq!(details.len(), 3);
    assert!(params.contains(&"userId"));
    assert!(params.contains(&"status"));
    assert!(params.contains(&"sneaky"));
}

#[tokio::test]
async fn test_audit_route_filters_records() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", "{}").await;
    let body = json!({"sql": "select * from orders"});
    app.post_sql("/api/v1/shop/prod/sql", Some("alice"), &body)
        .await;
    app.post_sql("/api/v1/shop/prod/sql", Some("bob"), &body)
        .await;

    let response = app
        .admin(Method::GET, "/api/v1/audit?actor=bob&status=blocked", None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["count"], 1);
    assert_eq!(response.body["records"][0]["actor"], "bob");

    let response = app
        .send(Request::get("/api/v1/audit").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let app = app().await;
    common::seed_tenant(&app.resources, "shop", "prod", r#"{"maxSelectLimit":10}"#).await;
    common::seed_tenant(&app.resources, "shop", "staging", r#"{"maxSelectLimit":1000}"#).await;

    let response = app
        .post_sql(
            "/api/v1/shop/prod/sql",
            Some("alice"),
            &json!({"sql": "select * from orders limit 50"}),
        )
        .await;
    assert_eq!(response.body["error"], "SELECT LIMIT 50 exceeds maximum of 10.");

    let key = TenantKey::new("shop", "staging").unwrap();
    let staging = app.resources.resolver.resolve(&key, false).await.unwrap();
    assert_eq!(staging.policy.max_select_limit, 1000);
}
