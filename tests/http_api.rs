use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use procurement_backend::{
    app::{create_app, AppState},
    auth::JwksCache,
    config::{Environment, Settings, StorageBackend},
    persistence::InMemoryStore,
};

fn test_settings() -> Settings {
    Settings {
        env: Environment::Dev,
        server_addr: "127.0.0.1:0".into(),
        storage_backend: StorageBackend::Memory,
        database_url: None,
        database_max_connections: 1,
        database_connect_retry_seconds: 0,
        cors_allow_origins: vec!["http://localhost:3000".into()],
        jwt_jwks_url: "http://127.0.0.1:9/.well-known/jwks.json".into(),
        jwt_issuer: "http://127.0.0.1:9/auth/v1".into(),
        jwt_audience: "authenticated".into(),
        jwks_cache_ttl_seconds: 60,
        refresh_token_ttl_days: 7,
        max_refresh_tokens_per_user: 5,
    }
}

fn test_app() -> Router {
    let settings = test_settings();
    let jwks = JwksCache::new(
        settings.jwt_jwks_url.clone(),
        settings.jwt_issuer.clone(),
        settings.jwt_audience.clone(),
        settings.jwks_cache_ttl_seconds,
    )
    .unwrap();
    create_app(AppState::new(Arc::new(InMemoryStore::new()), settings, jwks))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_memory_backend() {
    let response = test_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["storage"], "ok");
    assert_eq!(body["services"]["storage_backend"], "memory");
}

#[tokio::test]
async fn caller_request_id_is_echoed() {
    let response = test_app()
        .oneshot(
            Request::get("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let response = test_app()
        .oneshot(Request::get("/tenders").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn non_bearer_authorization_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::get("/bids")
                .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .header("x-request-id", "req-basic-auth")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid authorization format");
    assert_eq!(body["request_id"], "req-basic-auth");
}

#[tokio::test]
async fn malformed_bearer_token_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::post("/tenders")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_refresh_token_is_unauthorized() {
    let response = test_app()
        .oneshot(
            Request::post("/auth/refresh")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "refresh_token": "never-issued" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}
