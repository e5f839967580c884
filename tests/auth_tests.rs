mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{body_json, create_test_app, post_json, refresh_cookie_pair, register_user};
use tower::ServiceExt;

// --- Registration ---

#[tokio::test]
async fn test_register_success() {
    let (app, _db) = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/v1/auth/register",
            serde_json::json!({ "email": "alice@example.com", "password": "Passw0rd!" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("refresh-token="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));

    let json = body_json(response).await;
    assert!(json["accessToken"].as_str().is_some());
    assert_eq!(json["user"]["email"], "alice@example.com");
    assert_eq!(json["user"]["role"], "user");
    assert!(json["user"]["username"].as_str().unwrap().starts_with("user-"));
}

#[tokio::test]
async fn test_register_validation_errors() {
    let (app, _db) = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/v1/auth/register",
            serde_json::json!({ "password": "weak" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ValidationError");
    assert!(json["errors"]["email"].as_str().is_some());
    assert!(json["errors"]["password"].as_str().is_some());
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let (app, _db) = create_test_app().await;
    register_user(&app, "alice@example.com", None).await;

    let response = app
        .oneshot(post_json(
            "/api/v1/auth/register",
            serde_json::json!({ "email": "alice@example.com", "password": "Passw0rd!" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "DuplicateUser");
}

#[tokio::test]
async fn test_register_admin_requires_allowlist() {
    let (app, _db) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/auth/register",
            serde_json::json!({
                "email": "mallory@example.com",
                "password": "Passw0rd!",
                "role": "admin"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], "AuthorizationError");

    // The allow-listed email may register as admin
    let response = app
        .oneshot(post_json(
            "/api/v1/auth/register",
            serde_json::json!({
                "email": common::ADMIN_EMAIL,
                "password": "Passw0rd!",
                "role": "admin"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["user"]["role"], "admin");
}

// --- Login ---

#[tokio::test]
async fn test_login_success() {
    let (app, _db) = create_test_app().await;
    register_user(&app, "alice@example.com", None).await;

    let response = app
        .oneshot(post_json(
            "/api/v1/auth/login",
            serde_json::json!({ "email": "alice@example.com", "password": "Passw0rd!" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(refresh_cookie_pair(&response).is_some());
    let json = body_json(response).await;
    assert!(json["accessToken"].as_str().is_some());
}

#[tokio::test]
async fn test_login_wrong_password_indistinguishable_from_unknown_email() {
    let (app, _db) = create_test_app().await;
    register_user(&app, "alice@example.com", None).await;

    let wrong_password = app
        .clone()
        .oneshot(post_json(
            "/api/v1/auth/login",
            serde_json::json!({ "email": "alice@example.com", "password": "WrongPass1" }),
        ))
        .await
        .unwrap();
    let unknown_email = app
        .oneshot(post_json(
            "/api/v1/auth/login",
            serde_json::json!({ "email": "nobody@example.com", "password": "Passw0rd!" }),
        ))
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);

    let a = body_json(wrong_password).await;
    let b = body_json(unknown_email).await;
    assert_eq!(a["code"], "AuthenticationError");
    assert_eq!(a, b);
}

// --- Refresh ---

#[tokio::test]
async fn test_refresh_token_mints_new_access_token() {
    let (app, _db) = create_test_app().await;
    let user = register_user(&app, "alice@example.com", None).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/refresh-token")
                .header(header::COOKIE, &user.cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["accessToken"].as_str().is_some());
}

#[tokio::test]
async fn test_refresh_without_cookie_is_validation_error() {
    let (app, _db) = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/refresh-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ValidationError");
}

#[tokio::test]
async fn test_refresh_with_unknown_token_rejected() {
    let (app, _db) = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/refresh-token")
                .header(header::COOKIE, "refresh-token=not-in-the-ledger")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "AuthenticationError");
}

// --- Logout ---

#[tokio::test]
async fn test_logout_requires_auth() {
    let (app, _db) = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "AuthorizationError");
}

#[tokio::test]
async fn test_register_logout_refresh_cycle() {
    let (app, _db) = create_test_app().await;
    let user = register_user(&app, "alice@example.com", None).await;

    // Logout revokes the refresh token and clears the cookie
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/logout")
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", user.access_token),
                )
                .header(header::COOKIE, &user.cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let clear_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(clear_cookie.contains("Max-Age=0"));

    // The revoked refresh token no longer works
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/refresh-token")
                .header(header::COOKIE, &user.cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "AuthenticationError");
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let (app, _db) = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NotFound");
}
