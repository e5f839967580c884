mod auth;
mod blogs;
mod comments;
mod error;
mod likes;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    secure_cookies: bool,
    admin_emails: Arc<Vec<String>>,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
        admin_emails,
        rate_limit_config,
    };

    let users_state = users::UsersState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let blogs_state = blogs::BlogsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let comments_state = comments::CommentsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let likes_state = likes::LikesState { db, jwt };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/users", users::router(users_state))
        .nest("/blogs", blogs::router(blogs_state))
        .nest("/comments", comments::router(comments_state))
        .nest("/likes", likes::router(likes_state))
}
