//! Router-level tests that never reach the database.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use intraserver::core::config::AppConfig;
use intraserver::core::shared::state::AppState;
use intraserver::main_module::build_router;
use intraserver::triage::embedding::{EmbeddingProvider, HttpEmbeddingProvider};

const TENANT: &str = "550e8400-e29b-41d4-a716-446655440000";

fn app(embeddings: Option<Arc<dyn EmbeddingProvider>>) -> Router {
    let mut config = AppConfig::default();
    config.database.url = "postgres://nobody@127.0.0.1:1/none".to_string();
    let manager = ConnectionManager::<PgConnection>::new(config.database.url.clone());
    let pool = Pool::builder()
        .connection_timeout(Duration::from_millis(250))
        .build_unchecked(manager);
    build_router(Arc::new(AppState::new(pool, config, embeddings)))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let response = app(None)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_deep_health_reports_degraded_database() {
    let response = app(None)
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["database"], false);
    assert_eq!(body["ai"], false);
}

#[tokio::test]
async fn test_missing_tenant_is_unauthorized() {
    let response = app(None)
        .oneshot(Request::get("/api/books").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Tenant context required");
}

#[tokio::test]
async fn test_malformed_tenant_is_unauthorized() {
    let response = app(None)
        .oneshot(
            Request::get("/api/tickets")
                .header("X-Tenant-ID", "acme")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_search_is_rejected() {
    let response = app(None)
        .oneshot(
            Request::get("/api/search?q=%20%20")
                .header("X-Tenant-ID", TENANT)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("'q'"));
}

#[tokio::test]
async fn test_analysis_without_provider_is_unavailable() {
    let response = app(None)
        .oneshot(
            Request::post("/api/ai/analyze-ticket")
                .header("X-Tenant-ID", TENANT)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"title":"VPN","description":"cannot connect to the VPN"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_embedding_failure_is_bad_gateway() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/embeddings")
        .with_status(500)
        .with_body("model offline")
        .create_async()
        .await;

    let mut config = AppConfig::default();
    config.ai.embedding_url = server.url();
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(&config.ai).unwrap());

    let response = app(Some(provider))
        .oneshot(
            Request::post("/api/ai/analyze-ticket")
                .header("X-Tenant-ID", TENANT)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"title":"VPN","description":"cannot connect to the VPN"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_cors_preflight_allows_tenant_header() {
    let response = app(None)
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/pages")
                .header("Origin", "https://intranet.example.com")
                .header("Access-Control-Request-Method", "POST")
                .header("Access-Control-Request-Headers", "x-tenant-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_success());
    let allowed = response
        .headers()
        .get("access-control-allow-headers")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();
    assert!(allowed.contains("x-tenant-id"));
}
