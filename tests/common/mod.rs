#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use quillstack::{ServerConfig, create_app, db::Database, rate_limit::RateLimitConfig};
use std::time::Duration;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@quillstack.io";

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abc";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789ab";

/// App with relaxed rate limits so tests never trip the limiter.
pub async fn create_test_app() -> (Router, Database) {
    create_test_app_with_limits(RateLimitConfig::relaxed()).await
}

pub async fn create_test_app_with_limits(rate_limits: RateLimitConfig) -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        access_ttl: Duration::from_secs(900),
        refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        client_origin: "http://localhost:5173".to_string(),
        secure_cookies: false,
        rate_limits,
    };
    (create_app(&config), db)
}

/// Build a JSON POST request.
pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// Build a JSON request with a Bearer access token.
pub fn authed_json(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// Build a bodyless request with a Bearer access token.
pub fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .expect("Failed to build request")
}

/// Parse a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not valid JSON")
}

/// Extract the `refresh-token` cookie pair ("refresh-token=...") from a
/// Set-Cookie header, ready for replay in a Cookie header.
pub fn refresh_cookie_pair(response: &Response<Body>) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    let pair = value.split(';').next()?.trim();
    pair.starts_with("refresh-token=").then(|| pair.to_string())
}

pub struct RegisteredUser {
    pub email: String,
    pub access_token: String,
    pub cookie: String,
}

/// Register a user through the API, returning the access token and the
/// refresh cookie pair.
pub async fn register_user(app: &Router, email: &str, role: Option<&str>) -> RegisteredUser {
    let mut body = serde_json::json!({ "email": email, "password": "Passw0rd!" });
    if let Some(role) = role {
        body["role"] = serde_json::json!(role);
    }

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/auth/register", body))
        .await
        .expect("Register request failed");
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);

    let cookie = refresh_cookie_pair(&response).expect("No refresh cookie set");
    let json = body_json(response).await;
    let access_token = json["accessToken"]
        .as_str()
        .expect("No access token in response")
        .to_string();

    RegisteredUser {
        email: email.to_string(),
        access_token,
        cookie,
    }
}

/// Register an admin using the allow-listed email.
pub async fn register_admin(app: &Router) -> RegisteredUser {
    register_user(app, ADMIN_EMAIL, Some("admin")).await
}
