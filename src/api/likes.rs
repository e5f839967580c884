//! Like API endpoints.
//!
//! - POST `/blogs/{uuid}` - Like a blog
//! - DELETE `/blogs/{uuid}` - Remove a like
//!
//! A user can like a blog at most once; the unique (blog, user) pair in
//! the store enforces it. Responses carry the blog's current like count.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{AnyRole, Authorized};
use crate::db::{Blog, Database, LikeError};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct LikesState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(LikesState);

pub fn router(state: LikesState) -> Router {
    Router::new()
        .route("/blogs/{uuid}", post(like_blog).delete(unlike_blog))
        .with_state(state)
}

async fn blog_by_uuid(state: &LikesState, uuid: &str) -> Result<Blog, ApiError> {
    validate_uuid(uuid)?;
    state
        .db
        .blogs()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to get blog")?
        .ok_or_else(|| ApiError::not_found("Blog not found!"))
}

async fn like_blog(
    State(state): State<LikesState>,
    caller: Authorized<AnyRole>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blog = blog_by_uuid(&state, &uuid).await?;

    match state.db.likes().create(blog.id, caller.user.id).await {
        Ok(_) => {}
        Err(LikeError::AlreadyLiked) => {
            return Err(ApiError::already_liked("User already liked this blog!"));
        }
        Err(LikeError::Database(e)) => {
            return Err(ApiError::db_error("Failed to record like", e));
        }
    }

    let count = state
        .db
        .likes()
        .count_by_blog(blog.id)
        .await
        .db_err("Failed to count likes")?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Blog liked successfully!",
            "likeCount": count,
        })),
    ))
}

async fn unlike_blog(
    State(state): State<LikesState>,
    caller: Authorized<AnyRole>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blog = blog_by_uuid(&state, &uuid).await?;

    let removed = state
        .db
        .likes()
        .delete(blog.id, caller.user.id)
        .await
        .db_err("Failed to remove like")?;
    if !removed {
        return Err(ApiError::not_found("Like not found!"));
    }

    let count = state
        .db
        .likes()
        .count_by_blog(blog.id)
        .await
        .db_err("Failed to count likes")?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Like removed successfully!",
            "likeCount": count,
        })),
    ))
}
