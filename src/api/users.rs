//! User management API endpoints.
//!
//! - GET `/current` - Profile of the authenticated caller
//! - PUT `/current` - Update own profile
//! - DELETE `/current` - Delete own account
//! - GET `/` - List all users (admin)
//! - DELETE `/{uuid}` - Delete any account (admin)

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::auth::{BCRYPT_COST, validate_email, validate_password};
use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{AdminOnly, AuthUser, Authorized};
use crate::db::{Database, User, UserError};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

const MAX_NAME_LENGTH: usize = 20;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users))
        .route(
            "/current",
            get(current_user)
                .put(update_current_user)
                .delete(delete_current_user),
        )
        .route("/{uuid}", delete(delete_user))
        .with_state(state)
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    #[serde(rename = "firstName")]
    first_name: Option<String>,
    #[serde(rename = "lastName")]
    last_name: Option<String>,
}

fn validate_username(username: &str) -> Option<&'static str> {
    let chars = username.chars().count();
    if !(2..=20).contains(&chars) {
        return Some("Username must be between 2 and 20 characters");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Some("Username may only contain letters, digits, '-' and '_'");
    }
    None
}

#[derive(Serialize)]
struct UserResponse {
    user: User,
}

#[derive(Serialize)]
struct UserListResponse {
    users: Vec<User>,
}

#[derive(Serialize)]
struct UpdateUserResponse {
    message: &'static str,
    user: User,
}

async fn current_user(
    State(state): State<UsersState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_uuid(&auth.user_uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found!"))?;

    Ok((StatusCode::OK, Json(UserResponse { user })))
}

/// Partial profile update. Absent fields keep their current value; a new
/// password is re-hashed before it is stored.
async fn update_current_user(
    State(state): State<UsersState>,
    auth: AuthUser,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = BTreeMap::new();

    let username = payload.username.as_deref().map(str::trim);
    if let Some(username) = username {
        if let Some(msg) = validate_username(username) {
            errors.insert("username".to_string(), msg.to_string());
        }
    }

    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .map(str::to_ascii_lowercase);
    if let Some(email) = &email {
        if let Some(msg) = validate_email(email) {
            errors.insert("email".to_string(), msg.to_string());
        }
    }

    if let Some(password) = payload.password.as_deref() {
        if let Some(msg) = validate_password(password) {
            errors.insert("password".to_string(), msg.to_string());
        }
    }

    let first_name = payload.first_name.as_deref().map(str::trim);
    let last_name = payload.last_name.as_deref().map(str::trim);
    for (field, value) in [("firstName", first_name), ("lastName", last_name)] {
        if value.is_some_and(|v| v.chars().count() > MAX_NAME_LENGTH) {
            errors.insert(
                field.to_string(),
                "Name must be at most 20 characters".to_string(),
            );
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::validation("Validation failed!", errors));
    }

    let password_hash = match payload.password.as_deref() {
        None => None,
        Some(password) => Some(bcrypt::hash(password, BCRYPT_COST).map_err(|e| {
            error!("Failed to hash password: {}", e);
            ApiError::internal("Internal server error!")
        })?),
    };

    let updated = state
        .db
        .users()
        .update(
            &auth.user_uuid,
            username,
            email.as_deref(),
            password_hash.as_deref(),
            first_name,
            last_name,
        )
        .await;
    match updated {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::not_found("User not found!")),
        Err(UserError::Duplicate) => {
            return Err(ApiError::duplicate_user("Email or username already taken!"));
        }
        Err(UserError::Database(e)) => {
            return Err(ApiError::db_error("Failed to update user", e));
        }
    }

    let user = state
        .db
        .users()
        .get_by_uuid(&auth.user_uuid)
        .await
        .db_err("Failed to load updated user")?
        .ok_or_else(|| ApiError::not_found("User not found!"))?;

    Ok((
        StatusCode::OK,
        Json(UpdateUserResponse {
            message: "User updated successfully!",
            user,
        }),
    ))
}

/// Delete the caller's own account. The ledger purge is explicit even
/// though the foreign key cascade would cover it.
async fn delete_current_user(
    State(state): State<UsersState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_uuid(&auth.user_uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found!"))?;

    state
        .db
        .refresh_tokens()
        .delete_all_by_user(user.id)
        .await
        .db_err("Failed to purge refresh tokens")?;
    state
        .db
        .users()
        .delete_by_uuid(&auth.user_uuid)
        .await
        .db_err("Failed to delete user")?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Account deleted successfully!" })),
    ))
}

async fn list_users(
    State(state): State<UsersState>,
    _admin: Authorized<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users().list().await.db_err("Failed to list users")?;
    Ok((StatusCode::OK, Json(UserListResponse { users })))
}

async fn delete_user(
    State(state): State<UsersState>,
    _admin: Authorized<AdminOnly>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let user = state
        .db
        .users()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found!"))?;

    state
        .db
        .refresh_tokens()
        .delete_all_by_user(user.id)
        .await
        .db_err("Failed to purge refresh tokens")?;
    state
        .db
        .users()
        .delete_by_uuid(&uuid)
        .await
        .db_err("Failed to delete user")?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "User deleted successfully!" })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_none());
        assert!(validate_username("a_b-c1").is_none());
        assert!(validate_username("x").is_some());
        assert!(validate_username(&"a".repeat(21)).is_some());
        assert!(validate_username("has space").is_some());
        assert!(validate_username("émile").is_some());
    }
}
