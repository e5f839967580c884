mod common;

use axum::http::StatusCode;
use common::{create_test_app_with_limits, post_json};
use quillstack::rate_limit::RateLimitConfig;
use tower::ServiceExt;

#[tokio::test]
async fn test_login_rate_limit_trips_on_production_quota() {
    // Production quotas: 10 credential requests per minute per IP.
    // Requests without a resolvable IP share the same bucket.
    let (app, _db) = create_test_app_with_limits(RateLimitConfig::new()).await;

    let mut last_status = StatusCode::OK;
    for _ in 0..11 {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/auth/login",
                serde_json::json!({ "email": "alice@example.com", "password": "Passw0rd!" }),
            ))
            .await
            .unwrap();
        last_status = response.status();
    }

    assert_eq!(last_status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_relaxed_limits_never_trip() {
    let (app, _db) = create_test_app_with_limits(RateLimitConfig::relaxed()).await;

    for _ in 0..30 {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/auth/login",
                serde_json::json!({ "email": "alice@example.com", "password": "Passw0rd!" }),
            ))
            .await
            .unwrap();
        // Unknown credentials, but never a 429
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
