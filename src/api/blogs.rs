//! Blog API endpoints.
//!
//! - GET `/` - List blogs (drafts visible to admins only)
//! - GET `/{slug}` - Fetch one blog by slug
//! - POST `/` - Create a blog (admin)
//! - PUT `/{slug}` - Update a blog (author or admin)
//! - DELETE `/{slug}` - Delete a blog (author or admin)
//! - POST `/{slug}/views` - Record a view

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ResultExt};
use crate::auth::{AdminOnly, AnyRole, Authorized, MaybeAuthUser};
use crate::db::{Blog, BlogStatus, Database, User, UserRole};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::username::generate_slug;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct BlogsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(BlogsState);

pub fn router(state: BlogsState) -> Router {
    Router::new()
        .route("/", get(list_blogs).post(create_blog))
        .route("/{slug}", get(get_blog).put(update_blog).delete(delete_blog))
        .route("/{slug}/views", post(record_view))
        .with_state(state)
}

#[derive(Serialize)]
struct Pagination {
    total: i64,
    count: usize,
    limit: i64,
    offset: i64,
    #[serde(rename = "hasMore")]
    has_more: bool,
}

#[derive(Serialize)]
struct BlogListResponse {
    blogs: Vec<Blog>,
    pagination: Pagination,
}

#[derive(Deserialize)]
struct BlogPayload {
    title: Option<String>,
    content: Option<String>,
    status: Option<String>,
}

#[derive(Serialize)]
struct BlogResponse {
    message: &'static str,
    blog: Blog,
}

/// Parse limit/offset by hand so a malformed query string surfaces as the
/// usual validation error shape rather than an extractor rejection.
fn parse_list_query(query: Option<&str>) -> Result<(i64, i64), ApiError> {
    let mut limit = DEFAULT_LIMIT;
    let mut offset = 0;
    let mut errors = BTreeMap::new();

    for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "limit" => match value.parse::<i64>() {
                Ok(v) => limit = v.clamp(1, MAX_LIMIT),
                Err(_) => {
                    errors.insert("limit".to_string(), "Limit must be an integer".to_string());
                }
            },
            "offset" => match value.parse::<i64>() {
                Ok(v) => offset = v.max(0),
                Err(_) => {
                    errors.insert("offset".to_string(), "Offset must be an integer".to_string());
                }
            },
            _ => {}
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::validation("Validation failed!", errors));
    }
    Ok((limit, offset))
}

fn validate_title(title: &str, errors: &mut BTreeMap<String, String>) {
    let chars = title.chars().count();
    if !(3..=180).contains(&chars) {
        errors.insert(
            "title".to_string(),
            "Title must be between 3 and 180 characters".to_string(),
        );
    }
}

fn validate_content(content: &str, errors: &mut BTreeMap<String, String>) {
    if content.chars().count() < 10 {
        errors.insert(
            "content".to_string(),
            "Content must be at least 10 characters".to_string(),
        );
    }
}

fn parse_status(status: &str, errors: &mut BTreeMap<String, String>) -> BlogStatus {
    match status {
        "draft" => BlogStatus::Draft,
        "published" => BlogStatus::Published,
        _ => {
            errors.insert(
                "status".to_string(),
                "Status must be 'draft' or 'published'".to_string(),
            );
            BlogStatus::Draft
        }
    }
}

/// Blogs can be modified by their author or by any admin.
fn check_ownership(blog: &Blog, caller: &User) -> Result<(), ApiError> {
    if blog.author_id != caller.id && caller.role != UserRole::Admin {
        return Err(ApiError::authorization(
            "Access denied, insufficient permissions!",
        ));
    }
    Ok(())
}

/// Whether the (optional) caller gets to see drafts. Anonymous callers and
/// plain users do not; the role comes from the database, not the token.
async fn caller_sees_drafts(
    state: &BlogsState,
    auth: &MaybeAuthUser,
) -> Result<bool, ApiError> {
    let Some(user) = &auth.0 else {
        return Ok(false);
    };
    let role = state
        .db
        .users()
        .get_role_by_uuid(&user.user_uuid)
        .await
        .db_err("Failed to get user role")?;
    Ok(role == Some(UserRole::Admin))
}

async fn list_blogs(
    State(state): State<BlogsState>,
    auth: MaybeAuthUser,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = parse_list_query(query.as_deref())?;

    let include_drafts = caller_sees_drafts(&state, &auth).await?;

    let blogs = state
        .db
        .blogs()
        .list(include_drafts, limit, offset)
        .await
        .db_err("Failed to list blogs")?;
    let total = state
        .db
        .blogs()
        .count(include_drafts)
        .await
        .db_err("Failed to count blogs")?;

    let count = blogs.len();
    Ok((
        StatusCode::OK,
        Json(BlogListResponse {
            blogs,
            pagination: Pagination {
                total,
                count,
                limit,
                offset,
                has_more: offset + (count as i64) < total,
            },
        }),
    ))
}

async fn get_blog(
    State(state): State<BlogsState>,
    auth: MaybeAuthUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blog = state
        .db
        .blogs()
        .get_by_slug(&slug)
        .await
        .db_err("Failed to get blog")?
        .ok_or_else(|| ApiError::not_found("Blog not found!"))?;

    // Drafts are indistinguishable from missing blogs for non-admins
    if blog.status == BlogStatus::Draft && !caller_sees_drafts(&state, &auth).await? {
        return Err(ApiError::not_found("Blog not found!"));
    }

    Ok((StatusCode::OK, Json(blog)))
}

async fn create_blog(
    State(state): State<BlogsState>,
    admin: Authorized<AdminOnly>,
    Json(payload): Json<BlogPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = BTreeMap::new();

    let title = payload.title.as_deref().map(str::trim).unwrap_or_default();
    validate_title(title, &mut errors);

    let content = payload.content.as_deref().map(str::trim).unwrap_or_default();
    validate_content(content, &mut errors);

    let status = match payload.status.as_deref() {
        None => BlogStatus::Draft,
        Some(s) => parse_status(s, &mut errors),
    };

    if !errors.is_empty() {
        return Err(ApiError::validation("Validation failed!", errors));
    }

    let uuid = uuid::Uuid::new_v4().to_string();
    let slug = generate_slug(title);

    state
        .db
        .blogs()
        .create(&uuid, admin.user.id, title, &slug, content, status)
        .await
        .db_err("Failed to create blog")?;

    let blog = state
        .db
        .blogs()
        .get_by_slug(&slug)
        .await
        .db_err("Failed to load created blog")?
        .ok_or_else(|| ApiError::internal("Internal server error!"))?;

    Ok((
        StatusCode::CREATED,
        Json(BlogResponse {
            message: "Blog created successfully!",
            blog,
        }),
    ))
}

/// Partial update; absent fields keep their current value. The slug is
/// stable, a title edit does not regenerate it.
async fn update_blog(
    State(state): State<BlogsState>,
    caller: Authorized<AnyRole>,
    Path(slug): Path<String>,
    Json(payload): Json<BlogPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let blog = state
        .db
        .blogs()
        .get_by_slug(&slug)
        .await
        .db_err("Failed to get blog")?
        .ok_or_else(|| ApiError::not_found("Blog not found!"))?;

    check_ownership(&blog, &caller.user)?;

    let mut errors = BTreeMap::new();

    let title = payload.title.as_deref().map(str::trim);
    if let Some(title) = title {
        validate_title(title, &mut errors);
    }

    let content = payload.content.as_deref().map(str::trim);
    if let Some(content) = content {
        validate_content(content, &mut errors);
    }

    let status = match payload.status.as_deref() {
        None => None,
        Some(s) => Some(parse_status(s, &mut errors)),
    };

    if !errors.is_empty() {
        return Err(ApiError::validation("Validation failed!", errors));
    }

    state
        .db
        .blogs()
        .update(&slug, title, content, status)
        .await
        .db_err("Failed to update blog")?;

    let blog = state
        .db
        .blogs()
        .get_by_slug(&slug)
        .await
        .db_err("Failed to load updated blog")?
        .ok_or_else(|| ApiError::internal("Internal server error!"))?;

    Ok((
        StatusCode::OK,
        Json(BlogResponse {
            message: "Blog updated successfully!",
            blog,
        }),
    ))
}

/// Delete a blog. Its comments and likes go with it.
async fn delete_blog(
    State(state): State<BlogsState>,
    caller: Authorized<AnyRole>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blog = state
        .db
        .blogs()
        .get_by_slug(&slug)
        .await
        .db_err("Failed to get blog")?
        .ok_or_else(|| ApiError::not_found("Blog not found!"))?;

    check_ownership(&blog, &caller.user)?;

    state
        .db
        .blogs()
        .delete_by_slug(&slug)
        .await
        .db_err("Failed to delete blog")?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Blog deleted successfully!" })),
    ))
}

/// Anonymous view counter bump. No dedup; the frontend decides when a
/// view counts.
async fn record_view(
    State(state): State<BlogsState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let views = state
        .db
        .blogs()
        .increment_views(&slug)
        .await
        .db_err("Failed to record view")?
        .ok_or_else(|| ApiError::not_found("Blog not found!"))?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Blog view recorded!",
            "slug": slug,
            "viewCount": views,
        })),
    ))
}
