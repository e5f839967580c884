pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod rate_limit;
pub mod username;

use api::create_api_router;
use axum::{
    Json, Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
};
use db::Database;
use jwt::JwtConfig;
use rate_limit::{RateLimitConfig, rate_limit_general};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// HS256 secret for access tokens
    pub access_secret: Vec<u8>,
    /// HS256 secret for refresh tokens, distinct from the access secret
    pub refresh_secret: Vec<u8>,
    /// Access token lifetime
    pub access_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_ttl: Duration,
    /// Emails allowed to register with the admin role
    pub admin_emails: Vec<String>,
    /// Browser client origin for CORS
    pub client_origin: String,
    /// Whether to set Secure flag on cookies (true in production with HTTPS)
    pub secure_cookies: bool,
    /// Per-IP rate limiters; tests pass `RateLimitConfig::relaxed()`
    pub rate_limits: RateLimitConfig,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(
        &config.access_secret,
        &config.refresh_secret,
        config.access_ttl,
        config.refresh_ttl,
    ));

    let rate_limits = Arc::new(config.rate_limits.clone());

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        config.secure_cookies,
        Arc::new(config.admin_emails.clone()),
        rate_limits.clone(),
    )
    .layer(middleware::from_fn_with_state(
        rate_limits,
        rate_limit_general,
    ));

    // Credentialed CORS requires an explicit origin, never a wildcard
    let origin = config
        .client_origin
        .parse::<HeaderValue>()
        .expect("Invalid client origin");
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api/v1", api_router)
        .fallback(route_not_found)
        .layer(cors)
}

async fn route_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "code": "NotFound", "message": "Route not found!" })),
    )
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    // Run cleanup tasks on startup
    init_cleanup(&config.db).await;

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    Ok((handle, local_addr))
}
