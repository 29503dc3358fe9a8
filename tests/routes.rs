//! Router wiring checks that never reach the database.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use foodgram_api::routes::create_app;

async fn parse_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap_or_else(|e| panic!("Expected valid JSON body: {e}"))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_is_served() {
    let app = create_app(common::offline_state());
    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = parse_json(response).await;
    assert_eq!(json["data"]["status"], "ok");
}

#[tokio::test]
async fn protected_routes_reject_missing_token() {
    for (method, uri) in [
        ("GET", "/api/users/me"),
        ("GET", "/api/users/subscriptions"),
        ("GET", "/api/recipes/download_shopping_cart"),
        ("POST", "/api/auth/token/logout"),
        ("POST", "/api/recipes/00000000-0000-0000-0000-000000000001/favorite"),
        ("DELETE", "/api/admin/ingredients/00000000-0000-0000-0000-000000000001"),
    ] {
        let app = create_app(common::offline_state());
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");

        let json = parse_json(response).await;
        assert!(json["data"]["error"].is_string());
    }
}

#[tokio::test]
async fn malformed_token_is_rejected_on_public_reads() {
    let app = create_app(common::offline_state());
    let request = Request::builder()
        .uri("/api/recipes")
        .header(header::AUTHORIZATION, "Token not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_path_returns_json_404() {
    let app = create_app(common::offline_state());
    let response = app.oneshot(get("/api/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = parse_json(response).await;
    assert_eq!(json["message"], "Not Found");
    assert_eq!(json["data"]["path"], "/api/nope");
}

#[tokio::test]
async fn docs_are_served() {
    let app = create_app(common::offline_state());
    let response = app.oneshot(get("/docs")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
