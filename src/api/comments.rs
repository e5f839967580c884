//! Comment API endpoints.
//!
//! - GET `/blogs/{uuid}` - List a blog's comments, newest first
//! - POST `/blogs/{uuid}` - Comment on a blog
//! - DELETE `/{uuid}` - Delete a comment (author or admin)

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

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{AnyRole, Authorized};
use crate::db::{Blog, Comment, Database, UserRole};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

const MAX_COMMENT_LENGTH: usize = 1000;

#[derive(Clone)]
pub struct CommentsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(CommentsState);

pub fn router(state: CommentsState) -> Router {
    Router::new()
        .route("/blogs/{uuid}", get(list_comments).post(create_comment))
        .route("/{uuid}", delete(delete_comment))
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateCommentRequest {
    content: Option<String>,
}

#[derive(Serialize)]
struct CreateCommentResponse {
    message: &'static str,
    comment: Comment,
}

#[derive(Serialize)]
struct CommentListResponse {
    count: usize,
    comments: Vec<Comment>,
}

async fn blog_by_uuid(state: &CommentsState, uuid: &str) -> Result<Blog, ApiError> {
    validate_uuid(uuid)?;
    state
        .db
        .blogs()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to get blog")?
        .ok_or_else(|| ApiError::not_found("Blog not found!"))
}

async fn create_comment(
    State(state): State<CommentsState>,
    caller: Authorized<AnyRole>,
    Path(uuid): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let blog = blog_by_uuid(&state, &uuid).await?;

    let content = payload.content.as_deref().map(str::trim).unwrap_or_default();
    let mut errors = BTreeMap::new();
    if content.is_empty() {
        errors.insert("content".to_string(), "Content is required".to_string());
    } else if content.chars().count() > MAX_COMMENT_LENGTH {
        errors.insert(
            "content".to_string(),
            "Content must be at most 1000 characters".to_string(),
        );
    }
    if !errors.is_empty() {
        return Err(ApiError::validation("Validation failed!", errors));
    }

    let comment_uuid = uuid::Uuid::new_v4().to_string();
    state
        .db
        .comments()
        .create(&comment_uuid, blog.id, caller.user.id, content)
        .await
        .db_err("Failed to create comment")?;

    let comment = state
        .db
        .comments()
        .get_by_uuid(&comment_uuid)
        .await
        .db_err("Failed to load created comment")?
        .ok_or_else(|| ApiError::internal("Internal server error!"))?;

    Ok((
        StatusCode::CREATED,
        Json(CreateCommentResponse {
            message: "Comment created successfully!",
            comment,
        }),
    ))
}

async fn list_comments(
    State(state): State<CommentsState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blog = blog_by_uuid(&state, &uuid).await?;

    let comments = state
        .db
        .comments()
        .list_by_blog(blog.id)
        .await
        .db_err("Failed to list comments")?;

    Ok((
        StatusCode::OK,
        Json(CommentListResponse {
            count: comments.len(),
            comments,
        }),
    ))
}

/// Comments can be removed by their author or by any admin.
async fn delete_comment(
    State(state): State<CommentsState>,
    caller: Authorized<AnyRole>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let comment = state
        .db
        .comments()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get comment")?
        .ok_or_else(|| ApiError::not_found("Comment not found!"))?;

    if comment.user_id != caller.user.id && caller.user.role != UserRole::Admin {
        return Err(ApiError::authorization(
            "Access denied, insufficient permissions!",
        ));
    }

    state
        .db
        .comments()
        .delete_by_uuid(&uuid)
        .await
        .db_err("Failed to delete comment")?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Comment deleted successfully!" })),
    ))
}
