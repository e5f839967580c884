//! Authentication API endpoints.
//!
//! - POST `/register` - Create an account, mint a token pair
//! - POST `/login` - Verify credentials, mint a token pair
//! - POST `/refresh-token` - Exchange the refresh cookie for a new access token
//! - POST `/logout` - Revoke the refresh token and clear the cookie

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::error::{ApiError, ResultExt};
use crate::auth::{AuthUser, REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
use crate::db::{Database, UserError, UserRole};
use crate::impl_has_auth_backend;
use crate::jwt::{JwtConfig, JwtError};
use crate::rate_limit::{RateLimitConfig, rate_limit_auth};
use crate::username::generate_username;

pub(super) const BCRYPT_COST: u32 = 10;

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    pub admin_emails: Arc<Vec<String>>,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let credential_router = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_auth,
        ));

    let token_router = Router::new()
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .with_state(state);

    Router::new().merge(credential_router).merge(token_router)
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct PublicUser {
    role: UserRole,
    username: String,
    email: String,
}

#[derive(Serialize)]
struct AuthResponse {
    message: &'static str,
    user: PublicUser,
    #[serde(rename = "accessToken")]
    access_token: String,
}

#[derive(Serialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

pub(super) fn validate_email(email: &str) -> Option<&'static str> {
    if email.len() > 50 {
        return Some("Email must be less than 50 characters");
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Some("Invalid email address");
    };
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(|c| c.is_ascii_whitespace())
    {
        return Some("Invalid email address");
    }
    None
}

pub(super) fn validate_password(password: &str) -> Option<&'static str> {
    if password.len() < 8 {
        return Some("Password must be at least 8 characters long");
    }
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_upper || !has_lower || !has_digit {
        return Some("Password must contain at least one uppercase letter, one lowercase letter and one digit");
    }
    None
}

/// Pull email and password out of an optional-field payload, accumulating
/// per-field messages so the client sees every problem at once.
fn validate_credentials(
    email: Option<&str>,
    password: Option<&str>,
) -> Result<(String, String), ApiError> {
    let mut errors = BTreeMap::new();

    let email = email.map(str::trim).filter(|e| !e.is_empty());
    match email {
        None => {
            errors.insert("email".to_string(), "Email is required".to_string());
        }
        Some(email) => {
            if let Some(msg) = validate_email(email) {
                errors.insert("email".to_string(), msg.to_string());
            }
        }
    }

    match password {
        None | Some("") => {
            errors.insert("password".to_string(), "Password is required".to_string());
        }
        Some(password) => {
            if let Some(msg) = validate_password(password) {
                errors.insert("password".to_string(), msg.to_string());
            }
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::validation("Validation failed!", errors));
    }

    let email = email.unwrap_or_default().to_ascii_lowercase();
    let password = password.unwrap_or_default().to_string();
    Ok((email, password))
}

/// Mint an access + refresh pair, record the refresh token in the ledger,
/// and build the Set-Cookie header value.
async fn issue_tokens(state: &AuthState, user_uuid: &str, user_id: i64) -> Result<(String, String), ApiError> {
    let access = state.jwt.generate_access_token(user_uuid).map_err(|e| {
        error!("Failed to generate access token: {}", e);
        ApiError::internal("Internal server error!")
    })?;

    let refresh = state.jwt.generate_refresh_token(user_uuid).map_err(|e| {
        error!("Failed to generate refresh token: {}", e);
        ApiError::internal("Internal server error!")
    })?;

    state
        .db
        .refresh_tokens()
        .create(&refresh.token, user_id, refresh.expires_at)
        .await
        .db_err("Failed to record refresh token")?;

    let cookie = refresh_cookie(&refresh.token, refresh.duration, state.secure_cookies);
    Ok((access.token, cookie))
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password) =
        validate_credentials(payload.email.as_deref(), payload.password.as_deref())?;

    let role = match payload.role.as_deref() {
        None | Some("user") => UserRole::User,
        Some("admin") => UserRole::Admin,
        Some(_) => {
            let mut errors = BTreeMap::new();
            errors.insert("role".to_string(), "Role must be 'user' or 'admin'".to_string());
            return Err(ApiError::validation("Validation failed!", errors));
        }
    };

    // Admin registration is allow-listed by email
    if role == UserRole::Admin && !state.admin_emails.iter().any(|e| e.eq_ignore_ascii_case(&email)) {
        return Err(ApiError::authorization("You cannot register as an admin!"));
    }

    if state
        .db
        .users()
        .email_exists(&email)
        .await
        .db_err("Failed to check email")?
    {
        return Err(ApiError::duplicate_user("Email already registered!"));
    }

    let password_hash = bcrypt::hash(&password, BCRYPT_COST).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::internal("Internal server error!")
    })?;

    let uuid = uuid::Uuid::new_v4().to_string();
    let username = generate_username();

    // The existence check above can race a concurrent registration; the
    // unique constraint is authoritative and still maps to a conflict.
    let user_id = match state
        .db
        .users()
        .create(&uuid, &username, &email, &password_hash, role)
        .await
    {
        Ok(id) => id,
        Err(UserError::Duplicate) => {
            return Err(ApiError::duplicate_user("Email already registered!"));
        }
        Err(UserError::Database(e)) => {
            return Err(ApiError::db_error("Failed to create user", e));
        }
    };

    let (access_token, cookie) = issue_tokens(&state, &uuid, user_id).await?;

    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            message: "User registered successfully!",
            user: PublicUser {
                role,
                username,
                email,
            },
            access_token,
        }),
    ))
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password) =
        validate_credentials(payload.email.as_deref(), payload.password.as_deref())?;

    // Unknown email and wrong password are indistinguishable to the client
    let user = state
        .db
        .users()
        .get_login_user_by_email(&email)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::authentication("Invalid email or password!"))?;

    let valid = bcrypt::verify(&password, &user.password_hash).map_err(|e| {
        error!("Failed to verify password: {}", e);
        ApiError::internal("Internal server error!")
    })?;
    if !valid {
        return Err(ApiError::authentication("Invalid email or password!"));
    }

    let (access_token, cookie) = issue_tokens(&state, &user.uuid, user.id).await?;

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            message: "Logged in successfully!",
            user: PublicUser {
                role: user.role,
                username: user.username,
                email: user.email,
            },
            access_token,
        }),
    ))
}

/// Mint a new access token from a live refresh token. The ledger is
/// consulted before the signature so revoked tokens are rejected even if
/// they would still verify. The refresh token is not rotated.
async fn refresh_token(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = match get_cookie(&headers, REFRESH_COOKIE_NAME) {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => {
            let mut errors = BTreeMap::new();
            errors.insert(
                "refresh-token".to_string(),
                "Refresh token is required".to_string(),
            );
            return Err(ApiError::validation("Validation failed!", errors));
        }
    };

    let live = state
        .db
        .refresh_tokens()
        .exists(&token)
        .await
        .db_err("Failed to check refresh token")?;
    if !live {
        return Err(ApiError::authentication("Invalid refresh token!"));
    }

    let claims = state.jwt.validate_refresh_token(&token).map_err(|e| match e {
        JwtError::Expired => ApiError::token_expired("Token has expired!"),
        _ => ApiError::invalid_token("Invalid token!"),
    })?;

    let access = state
        .jwt
        .generate_access_token(&claims.user_uuid)
        .map_err(|e| {
            error!("Failed to generate access token: {}", e);
            ApiError::internal("Internal server error!")
        })?;

    Ok((
        StatusCode::OK,
        Json(RefreshResponse {
            access_token: access.token,
        }),
    ))
}

/// Revoke the presented refresh token and clear the cookie. An absent
/// cookie is fine; logout is idempotent.
async fn logout(
    State(state): State<AuthState>,
    _auth: AuthUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = get_cookie(&headers, REFRESH_COOKIE_NAME) {
        if !token.is_empty() {
            state
                .db
                .refresh_tokens()
                .delete_by_token(token)
                .await
                .db_err("Failed to revoke refresh token")?;
        }
    }

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
        Json(serde_json::json!({ "message": "Logged out successfully!" })),
    ))
}
