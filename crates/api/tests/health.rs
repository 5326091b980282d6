//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, build_test_app, get, test_config};
use explorer_api::router::request_timeout;
use explorer_db::local_cache::ENTITIES_KEY;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = build_test_app(Vec::new());
    let response = get(app.app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["remote_healthy"], true);
    assert_eq!(json["local_healthy"], true);
}

// ---------------------------------------------------------------------------
// Test: one failing source degrades health, both take it down
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_failing_sources() {
    let app = build_test_app(Vec::new());
    app.remote.set_failing(true);

    let json = body_json(get(app.app(), "/health").await).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["remote_healthy"], false);

    std::fs::write(app.dir.path().join(format!("{ENTITIES_KEY}.json")), "[oops").unwrap();
    let json = body_json(get(app.app(), "/health").await).await;
    assert_eq!(json["status"], "down");
    assert_eq!(json["local_healthy"], false);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app(Vec::new());
    let response = get(app.app(), "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = build_test_app(Vec::new());
    let response = get(app.app(), "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

// ---------------------------------------------------------------------------
// Test: CORS preflight allows the admin token header
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_allows_admin_header() {
    let app = build_test_app(Vec::new());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/entities")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type,x-admin-token")
        .body(Body::empty())
        .unwrap();

    let response = app.app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "http://localhost:5173"
    );
    let allowed = headers
        .get("access-control-allow-headers")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(allowed.contains("x-admin-token"));
}

#[tokio::test]
async fn cors_response_exposes_request_id_without_credentials() {
    let app = build_test_app(Vec::new());

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:5173")
        .body(Body::empty())
        .unwrap();

    let response = app.app().oneshot(request).await.unwrap();

    let headers = response.headers();
    let exposed = headers
        .get("access-control-expose-headers")
        .expect("x-request-id must be exposed")
        .to_str()
        .unwrap();
    assert!(exposed.contains("x-request-id"));
    assert!(headers.get("access-control-allow-credentials").is_none());
}

// ---------------------------------------------------------------------------
// Test: the request deadline leaves room for the remote fallback
// ---------------------------------------------------------------------------

#[test]
fn request_timeout_never_undercuts_remote_timeout() {
    let mut config = test_config();
    assert_eq!(request_timeout(&config).as_secs(), 30);

    config.request_timeout_secs = 2;
    config.remote_timeout_secs = 5;
    assert_eq!(request_timeout(&config).as_secs(), 6);
}
